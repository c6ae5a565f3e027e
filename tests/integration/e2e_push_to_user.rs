/// End-to-end user-push pipeline tests: online fan-out, offline residue
/// computation, callback hooks, and the offline adapter seam.
use imp_protocol::{AtTextElem, ContentType, options};
use imp_push::config::PushServiceConfig;
use imp_push::error::PushError;
use imp_push::metrics::PushMetrics;
use imp_push::offlinepush::{OfflinePushProvider, OfflinePusher};
use imp_push::pusher::Pusher;
use imp_test_utils::{
    MockConversationApi, MockGateway, MockGroupApi, MockGroupMemberCache, MockMessageApi,
    MockOfflinePusher, MockRegistry, MockTokenCache, RecordingCallback, flat_config,
    offline_result, online_result, single_chat_msg,
};
use std::sync::Arc;

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
            message: Arc::new(MockMessageApi::with_max_seq(0)),
            group: Arc::new(MockGroupApi::new()),
            members: Arc::new(MockGroupMemberCache::new()),
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

    fn pusher_without_offline(&self, config: PushServiceConfig, registry: MockRegistry) -> Pusher {
        Pusher::new(
            config,
            Arc::new(registry),
            None,
            Arc::clone(&self.callback) as _,
            Arc::clone(&self.conversation) as _,
            Arc::clone(&self.message) as _,
            Arc::clone(&self.group) as _,
            Arc::clone(&self.members) as _,
            Arc::clone(&self.metrics),
        )
    }
}

// ---------------------------------------------------------------------------
// Online-only paths
// ---------------------------------------------------------------------------

/// Two gateways, everyone reached online: the offline path never starts.
#[tokio::test]
async fn all_online_skips_offline_entirely() {
    let fx = Fixture::new();
    let gateway_a = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(online_result("u2")),
    );
    let gateway_b = Arc::new(MockGateway::new("gw-b").with_result(online_result("u3")));
    let registry = MockRegistry::new()
        .with_gateway(Arc::clone(&gateway_a))
        .with_gateway(Arc::clone(&gateway_b));
    let pusher = fx.pusher(flat_config(), registry);

    let msg = single_chat_msg("u0");
    let users = vec!["u1".to_owned(), "u2".to_owned(), "u3".to_owned()];
    pusher.push_to_user(&users, &msg).await.expect("push");

    // Every gateway got the full recipient list.
    assert_eq!(gateway_a.calls()[0].push_to_user_ids, users);
    assert_eq!(gateway_b.calls()[0].push_to_user_ids, users);
    assert!(fx.offline.calls().is_empty());
    assert!(fx.callback.offline_calls().is_empty());
}

#[tokio::test]
async fn empty_recipient_list_is_a_noop() {
    let fx = Fixture::new();
    let gateway = Arc::new(MockGateway::new("gw-a"));
    let registry = MockRegistry::new().with_gateway(Arc::clone(&gateway));
    let pusher = fx.pusher(flat_config(), registry);

    pusher
        .push_to_user(&[], &single_chat_msg("u0"))
        .await
        .expect("push");

    assert!(fx.callback.online_calls().is_empty());
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn offline_disabled_message_stops_after_online() {
    let fx = Fixture::new();
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(offline_result("u1")));
    let registry = MockRegistry::new().with_gateway(gateway);
    let pusher = fx.pusher(flat_config(), registry);

    let mut msg = single_chat_msg("u0");
    msg.options.set(options::OFFLINE_PUSH, false);
    pusher
        .push_to_user(&["u1".to_owned()], &msg)
        .await
        .expect("push");

    assert!(fx.offline.calls().is_empty());
    assert!(fx.callback.offline_calls().is_empty());
}

// ---------------------------------------------------------------------------
// Offline residue
// ---------------------------------------------------------------------------

/// One recipient unreachable online ends up as the sole offline target.
#[tokio::test]
async fn offline_residue_reaches_the_adapter() {
    let fx = Fixture::new();
    let gateway_a = Arc::new(
        MockGateway::new("gw-a")
            .with_result(online_result("u1"))
            .with_result(online_result("u2")),
    );
    let gateway_b = Arc::new(MockGateway::new("gw-b").with_result(offline_result("u3")));
    let registry = MockRegistry::new()
        .with_gateway(gateway_a)
        .with_gateway(gateway_b);
    let pusher = fx.pusher(flat_config(), registry);

    let users = vec!["u1".to_owned(), "u2".to_owned(), "u3".to_owned()];
    pusher
        .push_to_user(&users, &single_chat_msg("u0"))
        .await
        .expect("push");

    assert_eq!(fx.callback.offline_calls(), vec![vec!["u3".to_owned()]]);
    let pushes = fx.offline.calls();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].user_ids, vec!["u3".to_owned()]);
    assert_eq!(pushes[0].title, "Text");
}

/// A user reached online by one gateway is never offline-pushed, even if
/// another gateway also reports it as unreachable.
#[tokio::test]
async fn online_success_and_offline_targets_are_disjoint() {
    let fx = Fixture::new();
    let gateway_a = Arc::new(MockGateway::new("gw-a").with_result(online_result("u2")));
    let gateway_b = Arc::new(
        MockGateway::new("gw-b")
            .with_result(offline_result("u2"))
            .with_result(offline_result("u3")),
    );
    let registry = MockRegistry::new()
        .with_gateway(gateway_a)
        .with_gateway(gateway_b);
    let pusher = fx.pusher(flat_config(), registry);

    let users = vec!["u2".to_owned(), "u3".to_owned()];
    pusher
        .push_to_user(&users, &single_chat_msg("u0"))
        .await
        .expect("push");

    let pushes = fx.offline.calls();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].user_ids, vec!["u3".to_owned()]);
}

/// The sender's own ID never appears in the offline targets.
#[tokio::test]
async fn sender_is_never_offline_pushed() {
    let fx = Fixture::new();
    let gateway = Arc::new(
        MockGateway::new("gw-a")
            .with_result(offline_result("u0"))
            .with_result(offline_result("u1")),
    );
    let registry = MockRegistry::new().with_gateway(gateway);
    let pusher = fx.pusher(flat_config(), registry);

    let users = vec!["u0".to_owned(), "u1".to_owned()];
    pusher
        .push_to_user(&users, &single_chat_msg("u0"))
        .await
        .expect("push");

    let pushes = fx.offline.calls();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].user_ids, vec!["u1".to_owned()]);
}

// ---------------------------------------------------------------------------
// Callback hooks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn online_callback_veto_aborts_before_fanout() {
    let mut fx = Fixture::new();
    fx.callback = Arc::new(RecordingCallback::new().vetoing_online("blocked by policy"));
    let gateway = Arc::new(MockGateway::new("gw-a"));
    let registry = MockRegistry::new().with_gateway(Arc::clone(&gateway));
    let pusher = fx.pusher(flat_config(), registry);

    let err = pusher
        .push_to_user(&["u1".to_owned()], &single_chat_msg("u0"))
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::Callback(_)), "got {err:?}");
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn offline_callback_override_replaces_targets() {
    let mut fx = Fixture::new();
    fx.callback = Arc::new(RecordingCallback::new().with_offline_override(&["u9"]));
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(offline_result("u1")));
    let registry = MockRegistry::new().with_gateway(gateway);
    let pusher = fx.pusher(flat_config(), registry);

    pusher
        .push_to_user(&["u1".to_owned()], &single_chat_msg("u0"))
        .await
        .expect("push");

    // Hook saw the computed residue, adapter saw the override.
    assert_eq!(fx.callback.offline_calls(), vec![vec!["u1".to_owned()]]);
    assert_eq!(fx.offline.calls()[0].user_ids, vec!["u9".to_owned()]);
}

// ---------------------------------------------------------------------------
// Adapter seam
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_adapter_fails_only_the_offline_path() {
    let fx = Fixture::new();
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(offline_result("u1")));
    let registry = MockRegistry::new().with_gateway(gateway);
    let pusher = fx.pusher_without_offline(flat_config(), registry);

    let err = pusher
        .push_to_user(&["u1".to_owned()], &single_chat_msg("u0"))
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::NoOfflinePusher), "got {err:?}");
    assert_eq!(fx.metrics.snapshot().msg_offline_push_failed_total, 0);
}

#[tokio::test]
async fn provider_failure_increments_the_failure_counter() {
    let mut fx = Fixture::new();
    fx.offline = Arc::new(MockOfflinePusher::new().failing());
    let gateway = Arc::new(MockGateway::new("gw-a").with_result(offline_result("u1")));
    let registry = MockRegistry::new().with_gateway(gateway);
    let pusher = fx.pusher(flat_config(), registry);

    let err = pusher
        .push_to_user(&["u1".to_owned()], &single_chat_msg("u0"))
        .await
        .unwrap_err();
    assert!(matches!(err, PushError::OfflineProvider(_)), "got {err:?}");
    assert_eq!(fx.metrics.snapshot().msg_offline_push_failed_total, 1);
}

/// Unconfigured provider selects the dummy adapter: the offline path runs,
/// succeeds, and increments no failure counter — even for an @-mention.
#[tokio::test]
async fn unconfigured_provider_falls_back_to_dummy() {
    let fx = Fixture::new();
    let dummy = OfflinePusher::from_config(
        &flat_config().push,
        Arc::new(MockTokenCache::new()),
    )
    .expect("dummy adapter");
    assert_eq!(dummy.provider_name(), "dummy");

    let gateway = Arc::new(MockGateway::new("gw-a").with_result(offline_result("u1")));
    let registry = MockRegistry::new().with_gateway(gateway);
    let pusher = Pusher::new(
        flat_config(),
        Arc::new(registry),
        Some(Arc::new(dummy) as Arc<dyn OfflinePushProvider>),
        Arc::clone(&fx.callback) as _,
        Arc::clone(&fx.conversation) as _,
        Arc::clone(&fx.message) as _,
        Arc::clone(&fx.group) as _,
        Arc::clone(&fx.members) as _,
        Arc::clone(&fx.metrics),
    );

    let mut msg = single_chat_msg("u0");
    msg.content_type = ContentType::AtText;
    msg.content = serde_json::to_vec(&AtTextElem {
        text: "ping".to_owned(),
        at_user_list: vec!["u1".to_owned()],
        is_at_self: false,
    })
    .unwrap();
    pusher
        .push_to_user(&["u1".to_owned()], &msg)
        .await
        .expect("push");

    let snapshot = fx.metrics.snapshot();
    assert_eq!(snapshot.offline_push_total, 1);
    assert_eq!(snapshot.msg_offline_push_failed_total, 0);
}
