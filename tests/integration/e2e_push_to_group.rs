/// End-to-end group-push pipeline tests: membership resolution, lifecycle
/// augmentation and side effects, topology-specific offline residue, and
/// the PC/Web background wake-up.
use imp_protocol::{
    ContentType, GroupMemberInfo, MemberKickedTips, MemberQuitTips, SessionType,
    encode_notification,
};
use imp_push::config::PushServiceConfig;
use imp_push::metrics::PushMetrics;
use imp_push::offlinepush::OfflinePushProvider;
use imp_push::pusher::Pusher;
use imp_test_utils::{
    MockConversationApi, MockGateway, MockGroupApi, MockGroupMemberCache, MockMessageApi,
    MockOfflinePusher, MockRegistry, RecordingCallback, background_pc_result, flat_config,
    group_msg, offline_result, online_result, sharded_config,
};
use std::sync::Arc;

const GROUP_ID: &str = "g1";

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    conversation: Arc<MockConversationApi>,
    message: Arc<MockMessageApi>,
    group: Arc<MockGroupApi>,
    members: Arc<MockGroupMemberCache>,
    callback: Arc<RecordingCallback>,
    offline: Arc<MockOfflinePusher>,
    metrics: Arc<PushMetrics>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            conversation: Arc::new(MockConversationApi::new()),
            message: Arc::new(MockMessageApi::with_max_seq(42)),
            group: Arc::new(MockGroupApi::new()),
            members: Arc::new(MockGroupMemberCache::new().with_members(GROUP_ID, &["u1", "u2"])),
            callback: Arc::new(RecordingCallback::new()),
            offline: Arc::new(MockOfflinePusher::new()),
            metrics: Arc::new(PushMetrics::new()),
        }
    }

    fn pusher(&self, config: PushServiceConfig, registry: MockRegistry) -> Pusher {
        Pusher::new(
            config,
            Arc::new(registry),
            Some(Arc::clone(&self.offline) as Arc<dyn OfflinePushProvider>),
            Arc::clone(&self.callback) as _,
            Arc::clone(&self.conversation) as _,
            Arc::clone(&self.message) as _,
            Arc::clone(&self.group) as _,
            Arc::clone(&self.members) as _,
            Arc::clone(&self.metrics),
        )
    }
}

fn member(user_id: &str) -> GroupMemberInfo {
    GroupMemberInfo {
        group_id: GROUP_ID.to_owned(),
        user_id: user_id.to_owned(),
        nickname: String::new(),
    }
}

// ---------------------------------------------------------------------------
// Lifecycle notifications
// ---------------------------------------------------------------------------

/// Kicked users are appended to the recipients, and after the push their
/// conversation max-seq is fast-forwarded exactly once.
#[tokio::test]
async fn member_kick_augments_recipients_and_fast_forwards_seq() {
    let fx = Fixture::new();
    let gateway = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(online_result("u2")),
    );
    let registry = MockRegistry::new().with_gateway(Arc::clone(&gateway));
    let pusher = fx.pusher(flat_config(), registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.content_type = ContentType::MemberKickedNotification;
    msg.content = encode_notification(&MemberKickedTips {
        kicked_user_list: vec![member("u5"), member("u6")],
        ..Default::default()
    })
    .unwrap();
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert_eq!(
        gateway.calls()[0].push_to_user_ids,
        vec!["u1", "u2", "u5", "u6"]
    );
    let seq_calls = fx.conversation.set_seq_calls();
    assert_eq!(seq_calls.len(), 1);
    assert_eq!(
        seq_calls[0],
        (
            vec!["u5".to_owned(), "u6".to_owned()],
            "sg_g1".to_owned(),
            42
        )
    );
}

#[tokio::test]
async fn member_quit_adds_the_quitter() {
    let fx = Fixture::new();
    let gateway = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(online_result("u2")),
    );
    let registry = MockRegistry::new().with_gateway(Arc::clone(&gateway));
    let pusher = fx.pusher(flat_config(), registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.content_type = ContentType::MemberQuitNotification;
    msg.content = encode_notification(&MemberQuitTips {
        quit_user: member("u9"),
        ..Default::default()
    })
    .unwrap();
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert_eq!(gateway.calls()[0].push_to_user_ids, vec!["u1", "u2", "u9"]);
    let seq_calls = fx.conversation.set_seq_calls();
    assert_eq!(seq_calls.len(), 1);
    assert_eq!(seq_calls[0].0, vec!["u9".to_owned()]);
}

/// A malformed lifecycle payload skips the bookkeeping but not the push.
#[tokio::test]
async fn malformed_lifecycle_payload_still_pushes() {
    let fx = Fixture::new();
    let gateway = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(online_result("u2")),
    );
    let registry = MockRegistry::new().with_gateway(Arc::clone(&gateway));
    let pusher = fx.pusher(flat_config(), registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.content_type = ContentType::MemberKickedNotification;
    msg.content = b"not a notification".to_vec();
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert_eq!(gateway.calls()[0].push_to_user_ids, vec!["u1", "u2"]);
    assert!(fx.conversation.set_seq_calls().is_empty());
}

/// Dismiss on a notification conversation tears the group down exactly
/// once, under the first manager's identity.
#[tokio::test]
async fn group_dismiss_runs_once_under_manager_identity() {
    let fx = Fixture::new();
    let gateway = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(offline_result("u2")),
    );
    let registry = MockRegistry::new().with_shard("host-a", Arc::clone(&gateway), &["u1", "u2"]);
    let mut config = sharded_config();
    config.manager_user_ids = vec!["mgr1".to_owned()];
    config.admin_user_ids = vec!["adm1".to_owned()];
    let pusher = fx.pusher(config, registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.session_type = SessionType::Notification;
    msg.content_type = ContentType::GroupDismissedNotification;
    msg.content = encode_notification(&imp_protocol::GroupDismissedTips::default()).unwrap();
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert_eq!(
        fx.group.dismiss_calls(),
        vec![("mgr1".to_owned(), GROUP_ID.to_owned())]
    );
    // The sharded offline residue still ran for the unreachable member.
    assert_eq!(fx.offline.calls().len(), 1);
    assert_eq!(fx.offline.calls()[0].user_ids, vec!["u2".to_owned()]);
}

#[tokio::test]
async fn group_dismiss_falls_back_to_admin_identity() {
    let fx = Fixture::new();
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(online_result("u1")));
    let registry =
        MockRegistry::new().with_shard("host-a", Arc::clone(&gateway), &["u1", "u2"]);
    let mut config = sharded_config();
    config.admin_user_ids = vec!["adm1".to_owned()];
    let pusher = fx.pusher(config, registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.session_type = SessionType::Notification;
    msg.content_type = ContentType::GroupDismissedNotification;
    msg.content = encode_notification(&imp_protocol::GroupDismissedTips::default()).unwrap();
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert_eq!(
        fx.group.dismiss_calls(),
        vec![("adm1".to_owned(), GROUP_ID.to_owned())]
    );
}

/// Dismiss carried by an ordinary (non-notification) conversation does not
/// tear the group down.
#[tokio::test]
async fn group_dismiss_outside_notification_conversation_is_ignored() {
    let fx = Fixture::new();
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(online_result("u1")));
    let registry = MockRegistry::new().with_shard("host-a", Arc::clone(&gateway), &["u1", "u2"]);
    let pusher = fx.pusher(sharded_config(), registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.content_type = ContentType::GroupDismissedNotification;
    msg.content = encode_notification(&imp_protocol::GroupDismissedTips::default()).unwrap();
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert!(fx.group.dismiss_calls().is_empty());
}

// ---------------------------------------------------------------------------
// Topology-specific offline paths
// ---------------------------------------------------------------------------

/// Sharded fan-out groups recipients by their hash-assigned gateway.
#[tokio::test]
async fn sharded_fanout_groups_users_by_host() {
    let fx = Fixture::new();
    let gateway_a = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(online_result("u2")),
    );
    let gateway_b = Arc::new(MockGateway::new("gw-b").with_result(online_result("u3")));
    let registry = MockRegistry::new()
        .with_shard("host-a", Arc::clone(&gateway_a), &["u1", "u2"])
        .with_shard("host-b", Arc::clone(&gateway_b), &["u3"]);
    let fx = Fixture {
        members: Arc::new(MockGroupMemberCache::new().with_members(GROUP_ID, &["u1", "u2", "u3"])),
        ..fx
    };
    let pusher = fx.pusher(sharded_config(), registry);

    pusher
        .push_to_group(GROUP_ID, &group_msg("u0", GROUP_ID))
        .await
        .expect("push");

    assert_eq!(gateway_a.calls().len(), 1);
    assert_eq!(gateway_a.calls()[0].push_to_user_ids, vec!["u1", "u2"]);
    assert_eq!(gateway_b.calls().len(), 1);
    assert_eq!(gateway_b.calls()[0].push_to_user_ids, vec!["u3"]);
}

/// Signaling notifications never reach the offline provider, though the
/// offline hook still observes the residue.
#[tokio::test]
async fn signaling_notification_skips_offline() {
    let fx = Fixture::new();
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(offline_result("u1")));
    let registry = MockRegistry::new().with_shard("host-a", Arc::clone(&gateway), &["u1", "u2"]);
    let pusher = fx.pusher(sharded_config(), registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.content_type = ContentType::SignalingNotification;
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert_eq!(fx.callback.offline_calls().len(), 1);
    assert!(fx.conversation.filter_calls().is_empty());
    assert!(fx.offline.calls().is_empty());
}

/// Flat path: the offline residue is the recipient list minus the online
/// successes, the mute filter applies, and backgrounded PC/Web clients get
/// a second online push after the offline push lands.
#[tokio::test]
async fn flat_path_wakes_backgrounded_pc_clients_after_offline_push() {
    let fx = Fixture::new();
    let gateway_a = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(online_result("u2")),
    );
    let gateway_b = Arc::new(MockGateway::new("gw-b").with_result(background_pc_result("u3")));
    let registry = MockRegistry::new()
        .with_gateway(Arc::clone(&gateway_a))
        .with_gateway(Arc::clone(&gateway_b));
    let fx = Fixture {
        members: Arc::new(MockGroupMemberCache::new().with_members(GROUP_ID, &["u1", "u2", "u3"])),
        ..fx
    };
    let pusher = fx.pusher(flat_config(), registry);

    pusher
        .push_to_group(GROUP_ID, &group_msg("u0", GROUP_ID))
        .await
        .expect("push");

    // Offline hook and adapter both saw exactly the residue.
    assert_eq!(fx.callback.offline_calls(), vec![vec!["u3".to_owned()]]);
    assert_eq!(fx.offline.calls().len(), 1);
    assert_eq!(fx.offline.calls()[0].user_ids, vec!["u3".to_owned()]);
    // Mute filter ran against the group conversation.
    assert_eq!(fx.conversation.filter_calls()[0].0, "sg_g1");

    // Second online push carried the woken background client to every
    // gateway.
    let calls_a = gateway_a.calls();
    assert_eq!(calls_a.len(), 2);
    assert_eq!(calls_a[1].push_to_user_ids, vec!["u3".to_owned()]);
    let calls_b = gateway_b.calls();
    assert_eq!(calls_b.len(), 2);
    assert_eq!(calls_b[1].push_to_user_ids, vec!["u3".to_owned()]);
}

/// Muted recipients drop out before the adapter is invoked; with nothing
/// left, neither the offline push nor the wake-up push happens.
#[tokio::test]
async fn mute_filter_can_empty_the_offline_targets() {
    let fx = Fixture::new();
    let gateway = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(background_pc_result("u2")),
    );
    let registry = MockRegistry::new().with_gateway(Arc::clone(&gateway));
    let fx = Fixture {
        conversation: Arc::new(MockConversationApi::new().with_muted(&["u2"])),
        ..fx
    };
    let pusher = fx.pusher(flat_config(), registry);

    pusher
        .push_to_group(GROUP_ID, &group_msg("u0", GROUP_ID))
        .await
        .expect("push");

    assert!(fx.offline.calls().is_empty());
    assert_eq!(gateway.calls().len(), 1);
}

// ---------------------------------------------------------------------------
// Hook-supplied recipient lists
// ---------------------------------------------------------------------------

/// A recipient list supplied by the pre-group hook bypasses both the
/// member cache and the lifecycle augmentation.
#[tokio::test]
async fn hook_supplied_recipients_bypass_membership_resolution() {
    let fx = Fixture::new();
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(online_result("u7")));
    let registry = MockRegistry::new().with_gateway(Arc::clone(&gateway));
    let fx = Fixture {
        // Empty member cache: resolving membership would fail the push.
        members: Arc::new(MockGroupMemberCache::new()),
        callback: Arc::new(RecordingCallback::new().with_group_recipients(&["u7"])),
        ..fx
    };
    let pusher = fx.pusher(flat_config(), registry);

    let mut msg = group_msg("u0", GROUP_ID);
    msg.content_type = ContentType::MemberKickedNotification;
    msg.content = encode_notification(&MemberKickedTips {
        kicked_user_list: vec![member("u5")],
        ..Default::default()
    })
    .unwrap();
    pusher.push_to_group(GROUP_ID, &msg).await.expect("push");

    assert_eq!(gateway.calls()[0].push_to_user_ids, vec!["u7"]);
    assert!(fx.conversation.set_seq_calls().is_empty());
}
