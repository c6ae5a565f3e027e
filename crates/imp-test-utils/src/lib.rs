// imp-test-utils: Mock collaborators for push-pipeline integration tests.
//
// Every mock records the calls it receives so tests can assert on the
// exact interaction, and each test builds its own isolated instances.

pub mod mock_gateway;
pub mod mock_services;

pub use mock_gateway::{ConcurrencyGauge, MockGateway, MockRegistry};
pub use mock_services::{
    MockConversationApi, MockGroupApi, MockGroupMemberCache, MockMessageApi, MockOfflinePusher,
    MockTokenCache, RecordingCallback,
};

use imp_protocol::{
    ContentType, DevicePushResult, MsgData, MsgOptions, PlatformId, SessionType, UserPushResult,
    BACKGROUND_RESULT_CODE,
};
use imp_push::config::{PushConfig, PushServiceConfig, Topology};

// ---------------------------------------------------------------------------
// Message builders
// ---------------------------------------------------------------------------

/// A single-chat text message from `send_id` with offline push enabled.
pub fn single_chat_msg(send_id: &str) -> MsgData {
    MsgData {
        send_id: send_id.to_owned(),
        recv_id: String::new(),
        group_id: String::new(),
        client_msg_id: format!("cm-{send_id}"),
        server_msg_id: String::new(),
        session_type: SessionType::SingleChat,
        content_type: ContentType::Text,
        content: b"hello".to_vec(),
        send_time: 1_700_000_000_000,
        options: MsgOptions::new(),
        offline_push_info: None,
    }
}

/// A super-group text message from `send_id` with offline push enabled.
pub fn group_msg(send_id: &str, group_id: &str) -> MsgData {
    MsgData {
        group_id: group_id.to_owned(),
        session_type: SessionType::SuperGroupChat,
        ..single_chat_msg(send_id)
    }
}

// ---------------------------------------------------------------------------
// Per-recipient result builders
// ---------------------------------------------------------------------------

/// Result for a user reached on a live connection.
pub fn online_result(user_id: &str) -> UserPushResult {
    UserPushResult {
        user_id: user_id.to_owned(),
        online_push: true,
        resp: vec![DevicePushResult {
            platform_id: PlatformId::Android,
            result_code: 0,
        }],
    }
}

/// Result for a user the gateway knows but could not deliver to.
pub fn offline_result(user_id: &str) -> UserPushResult {
    UserPushResult {
        user_id: user_id.to_owned(),
        online_push: false,
        resp: Vec::new(),
    }
}

/// Result for a user whose only connection is a backgrounded PC client.
pub fn background_pc_result(user_id: &str) -> UserPushResult {
    UserPushResult {
        user_id: user_id.to_owned(),
        online_push: false,
        resp: vec![DevicePushResult {
            platform_id: PlatformId::Windows,
            result_code: BACKGROUND_RESULT_CODE,
        }],
    }
}

// ---------------------------------------------------------------------------
// Config builders
// ---------------------------------------------------------------------------

fn base_config(topology: Topology) -> PushServiceConfig {
    PushServiceConfig {
        topology,
        gateway_service_name: "msg-gateway".to_owned(),
        push: PushConfig {
            enable: String::new(),
            max_concurrent_workers: 3,
            getui: None,
            fcm: None,
            jpush: None,
        },
        manager_user_ids: Vec::new(),
        admin_user_ids: Vec::new(),
    }
}

/// Flat-topology (zookeeper-style) service config.
pub fn flat_config() -> PushServiceConfig {
    base_config(Topology::Flat)
}

/// Sharded-topology (k8s-style) service config.
pub fn sharded_config() -> PushServiceConfig {
    base_config(Topology::Sharded)
}
