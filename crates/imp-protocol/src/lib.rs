// imp-protocol: Push-pipeline message types and serialization.
//
// Everything that crosses a service boundary in the push pipeline lives
// here: the message unit, content/session/platform tags, the per-recipient
// fan-out results returned by message gateways, and the notification
// payloads carried inside group-lifecycle messages.
//
// Numeric wire codes (content types, session types, platform IDs) are
// stable protocol constants; unknown codes survive decode/encode through
// the `Other` escape variants.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod conversation;

/// Gateway result code meaning "client is connected but the device is
/// backgrounded/idle".  Only meaningful on PC/Web platforms, where it
/// triggers the re-push after an offline push has landed.
pub const BACKGROUND_RESULT_CODE: i32 = -2;

// ---------------------------------------------------------------------------
// Session types
// ---------------------------------------------------------------------------

/// Conversation/session kind of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum SessionType {
    SingleChat,
    GroupChat,
    SuperGroupChat,
    Notification,
    Other(i32),
}

impl From<i32> for SessionType {
    fn from(code: i32) -> Self {
        match code {
            1 => SessionType::SingleChat,
            2 => SessionType::GroupChat,
            3 => SessionType::SuperGroupChat,
            4 => SessionType::Notification,
            other => SessionType::Other(other),
        }
    }
}

impl From<SessionType> for i32 {
    fn from(t: SessionType) -> i32 {
        match t {
            SessionType::SingleChat => 1,
            SessionType::GroupChat => 2,
            SessionType::SuperGroupChat => 3,
            SessionType::Notification => 4,
            SessionType::Other(code) => code,
        }
    }
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

/// Content-type tag of a message.
///
/// Codes 101-115 are ordinary content; 15xx are group-lifecycle
/// notifications; 1701 is real-time signaling (never offline-pushed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ContentType {
    Text,
    Picture,
    Voice,
    Video,
    File,
    AtText,
    Custom,
    Typing,
    Quote,
    MemberQuitNotification,
    MemberKickedNotification,
    GroupDismissedNotification,
    SignalingNotification,
    Other(i32),
}

impl From<i32> for ContentType {
    fn from(code: i32) -> Self {
        match code {
            101 => ContentType::Text,
            102 => ContentType::Picture,
            103 => ContentType::Voice,
            104 => ContentType::Video,
            105 => ContentType::File,
            106 => ContentType::AtText,
            110 => ContentType::Custom,
            113 => ContentType::Typing,
            114 => ContentType::Quote,
            1504 => ContentType::MemberQuitNotification,
            1508 => ContentType::MemberKickedNotification,
            1511 => ContentType::GroupDismissedNotification,
            1701 => ContentType::SignalingNotification,
            other => ContentType::Other(other),
        }
    }
}

impl From<ContentType> for i32 {
    fn from(t: ContentType) -> i32 {
        match t {
            ContentType::Text => 101,
            ContentType::Picture => 102,
            ContentType::Voice => 103,
            ContentType::Video => 104,
            ContentType::File => 105,
            ContentType::AtText => 106,
            ContentType::Custom => 110,
            ContentType::Typing => 113,
            ContentType::Quote => 114,
            ContentType::MemberQuitNotification => 1504,
            ContentType::MemberKickedNotification => 1508,
            ContentType::GroupDismissedNotification => 1511,
            ContentType::SignalingNotification => 1701,
            ContentType::Other(code) => code,
        }
    }
}

// ---------------------------------------------------------------------------
// Platforms
// ---------------------------------------------------------------------------

/// Client platform reported by a gateway in per-device push results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum PlatformId {
    Ios,
    Android,
    Windows,
    OsX,
    Web,
    MiniWeb,
    Linux,
    AndroidPad,
    IPad,
    Admin,
    Other(i32),
}

impl PlatformId {
    /// Desktop terminals: Windows, macOS and Linux.
    pub fn is_pc(self) -> bool {
        matches!(self, PlatformId::Windows | PlatformId::OsX | PlatformId::Linux)
    }
}

impl From<i32> for PlatformId {
    fn from(code: i32) -> Self {
        match code {
            1 => PlatformId::Ios,
            2 => PlatformId::Android,
            3 => PlatformId::Windows,
            4 => PlatformId::OsX,
            5 => PlatformId::Web,
            6 => PlatformId::MiniWeb,
            7 => PlatformId::Linux,
            8 => PlatformId::AndroidPad,
            9 => PlatformId::IPad,
            10 => PlatformId::Admin,
            other => PlatformId::Other(other),
        }
    }
}

impl From<PlatformId> for i32 {
    fn from(p: PlatformId) -> i32 {
        match p {
            PlatformId::Ios => 1,
            PlatformId::Android => 2,
            PlatformId::Windows => 3,
            PlatformId::OsX => 4,
            PlatformId::Web => 5,
            PlatformId::MiniWeb => 6,
            PlatformId::Linux => 7,
            PlatformId::AndroidPad => 8,
            PlatformId::IPad => 9,
            PlatformId::Admin => 10,
            PlatformId::Other(code) => code,
        }
    }
}

// ---------------------------------------------------------------------------
// Message options
// ---------------------------------------------------------------------------

/// Well-known option keys.
pub mod options {
    pub const OFFLINE_PUSH: &str = "offlinePush";
    pub const HISTORY: &str = "history";
    pub const UNREAD_COUNT: &str = "unreadCount";
}

/// Keyed boolean options attached to a message.
///
/// An absent key reads as `true`: senders only write a key to switch a
/// behavior off, so the empty bag enables everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgOptions(HashMap<String, bool>);

impl MsgOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: bool) -> Self {
        self.0.insert(key.to_owned(), value);
        self
    }

    pub fn set(&mut self, key: &str, value: bool) {
        self.0.insert(key.to_owned(), value);
    }

    /// Read a switch; absent keys are on.
    pub fn get(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(true)
    }

    /// Whether the offline-push channel is enabled for this message.
    pub fn is_offline_push(&self) -> bool {
        self.get(options::OFFLINE_PUSH)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Per-message offline-push presentation overrides supplied by the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflinePushInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub desc: String,
    /// Opaque extension payload forwarded to the provider untouched.
    #[serde(default)]
    pub ex: String,
    #[serde(default)]
    pub ios_push_sound: String,
    #[serde(default)]
    pub ios_badge_count: bool,
}

/// The unit of delivery handed over by the message-transfer stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgData {
    pub send_id: String,
    #[serde(default)]
    pub recv_id: String,
    #[serde(default)]
    pub group_id: String,
    pub client_msg_id: String,
    #[serde(default)]
    pub server_msg_id: String,
    pub session_type: SessionType,
    pub content_type: ContentType,
    /// Opaque content bytes; interpretation depends on `content_type`.
    #[serde(default)]
    pub content: Vec<u8>,
    #[serde(default)]
    pub send_time: i64,
    #[serde(default)]
    pub options: MsgOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_push_info: Option<OfflinePushInfo>,
}

// ---------------------------------------------------------------------------
// Gateway fan-out request/results
// ---------------------------------------------------------------------------

/// Batch-push request dispatched to a message gateway.
///
/// In flat topology the same request (full user list) goes to every
/// gateway; in sharded topology each gateway receives only its own subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineBatchPushRequest {
    pub msg: MsgData,
    pub push_to_user_ids: Vec<String>,
}

/// Outcome for one device connection during an online push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePushResult {
    pub platform_id: PlatformId,
    pub result_code: i32,
}

/// Outcome for one user during an online push.
///
/// `online_push == true` means at least one live connection received the
/// message.  A gateway reports only users it holds connections for, so a
/// flat-mode merge sees each user at most once per owning gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPushResult {
    pub user_id: String,
    pub online_push: bool,
    #[serde(default)]
    pub resp: Vec<DevicePushResult>,
}

// ---------------------------------------------------------------------------
// Content payloads
// ---------------------------------------------------------------------------

/// AtText content body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtTextElem {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "atUserList")]
    pub at_user_list: Vec<String>,
    #[serde(default, rename = "isAtSelf")]
    pub is_at_self: bool,
}

// ---------------------------------------------------------------------------
// Group-lifecycle notification payloads
// ---------------------------------------------------------------------------

/// Outer envelope of every notification message: the real payload is a
/// JSON document nested in `detail`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationElem {
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(default, rename = "groupID")]
    pub group_id: String,
    #[serde(default, rename = "groupName")]
    pub group_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMemberInfo {
    #[serde(default, rename = "groupID")]
    pub group_id: String,
    #[serde(default, rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub nickname: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberQuitTips {
    #[serde(default)]
    pub group: GroupInfo,
    #[serde(default, rename = "quitUser")]
    pub quit_user: GroupMemberInfo,
    #[serde(default, rename = "operationTime")]
    pub operation_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberKickedTips {
    #[serde(default)]
    pub group: GroupInfo,
    #[serde(default, rename = "opUser")]
    pub op_user: GroupMemberInfo,
    #[serde(default, rename = "kickedUserList")]
    pub kicked_user_list: Vec<GroupMemberInfo>,
    #[serde(default, rename = "operationTime")]
    pub operation_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDismissedTips {
    #[serde(default)]
    pub group: GroupInfo,
    #[serde(default, rename = "opUser")]
    pub op_user: GroupMemberInfo,
    #[serde(default, rename = "operationTime")]
    pub operation_time: i64,
}

/// Decode a notification payload out of message content bytes.
///
/// Two-stage: the content is a `NotificationElem` envelope whose `detail`
/// string holds the typed tips document.
pub fn decode_notification<T: DeserializeOwned>(content: &[u8]) -> Result<T, serde_json::Error> {
    let elem: NotificationElem = serde_json::from_slice(content)?;
    serde_json::from_str(&elem.detail)
}

/// Encode a tips document into notification content bytes (envelope + detail).
pub fn encode_notification<T: Serialize>(tips: &T) -> Result<Vec<u8>, serde_json::Error> {
    let elem = NotificationElem {
        detail: serde_json::to_string(tips)?,
    };
    serde_json::to_vec(&elem)
}
