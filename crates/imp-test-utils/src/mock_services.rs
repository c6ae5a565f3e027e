// mock_services: Recording mocks for the dispatcher's collaborators.

use async_trait::async_trait;
use imp_protocol::{MsgData, PlatformId};
use imp_push::callback::PushCallback;
use imp_push::clients::{ConversationApi, GroupApi, GroupMemberCache, MessageApi};
use imp_push::error::PushError;
use imp_push::offlinepush::{OfflinePushProvider, Opts, TokenCache};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Conversation service
// ---------------------------------------------------------------------------

/// Conversation service with a scripted mute list.
#[derive(Default)]
pub struct MockConversationApi {
    muted: HashSet<String>,
    fail_filter: bool,
    filter_calls: Mutex<Vec<(String, Vec<String>)>>,
    set_seq_calls: Mutex<Vec<(Vec<String>, String, i64)>>,
}

impl MockConversationApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Users the mute filter drops.
    pub fn with_muted(mut self, users: &[&str]) -> Self {
        self.muted = users.iter().map(|u| (*u).to_owned()).collect();
        self
    }

    pub fn failing_filter(mut self) -> Self {
        self.fail_filter = true;
        self
    }

    pub fn filter_calls(&self) -> Vec<(String, Vec<String>)> {
        self.filter_calls.lock().expect("lock").clone()
    }

    pub fn set_seq_calls(&self) -> Vec<(Vec<String>, String, i64)> {
        self.set_seq_calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ConversationApi for MockConversationApi {
    async fn get_conversation_offline_push_user_ids(
        &self,
        conversation_id: &str,
        user_ids: &[String],
    ) -> Result<Vec<String>, PushError> {
        self.filter_calls
            .lock()
            .expect("lock")
            .push((conversation_id.to_owned(), user_ids.to_vec()));
        if self.fail_filter {
            return Err(PushError::Rpc("injected conversation failure".to_owned()));
        }
        Ok(user_ids
            .iter()
            .filter(|id| !self.muted.contains(*id))
            .cloned()
            .collect())
    }

    async fn set_conversation_max_seq(
        &self,
        user_ids: &[String],
        conversation_id: &str,
        max_seq: i64,
    ) -> Result<(), PushError> {
        self.set_seq_calls.lock().expect("lock").push((
            user_ids.to_vec(),
            conversation_id.to_owned(),
            max_seq,
        ));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Message service
// ---------------------------------------------------------------------------

pub struct MockMessageApi {
    max_seq: i64,
}

impl MockMessageApi {
    pub fn with_max_seq(max_seq: i64) -> Self {
        Self { max_seq }
    }
}

#[async_trait]
impl MessageApi for MockMessageApi {
    async fn get_conversation_max_seq(&self, _conversation_id: &str) -> Result<i64, PushError> {
        Ok(self.max_seq)
    }
}

// ---------------------------------------------------------------------------
// Group service
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockGroupApi {
    dismiss_calls: Mutex<Vec<(String, String)>>,
}

impl MockGroupApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(op_user_id, group_id)` dismiss calls.
    pub fn dismiss_calls(&self) -> Vec<(String, String)> {
        self.dismiss_calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl GroupApi for MockGroupApi {
    async fn dismiss_group(&self, op_user_id: &str, group_id: &str) -> Result<(), PushError> {
        self.dismiss_calls
            .lock()
            .expect("lock")
            .push((op_user_id.to_owned(), group_id.to_owned()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Group-member cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockGroupMemberCache {
    members: HashMap<String, Vec<String>>,
}

impl MockGroupMemberCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(mut self, group_id: &str, users: &[&str]) -> Self {
        self.members.insert(
            group_id.to_owned(),
            users.iter().map(|u| (*u).to_owned()).collect(),
        );
        self
    }
}

#[async_trait]
impl GroupMemberCache for MockGroupMemberCache {
    async fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>, PushError> {
        self.members
            .get(group_id)
            .cloned()
            .ok_or_else(|| PushError::Rpc(format!("unknown group {group_id}")))
    }
}

// ---------------------------------------------------------------------------
// Token cache
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockTokenCache {
    device_tokens: HashMap<(String, i32), Vec<String>>,
    provider_token: Mutex<Option<String>>,
}

impl MockTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_token(mut self, user_id: &str, platform: PlatformId, token: &str) -> Self {
        self.device_tokens
            .entry((user_id.to_owned(), i32::from(platform)))
            .or_default()
            .push(token.to_owned());
        self
    }
}

#[async_trait]
impl TokenCache for MockTokenCache {
    async fn get_device_tokens(
        &self,
        user_id: &str,
        platform_id: PlatformId,
    ) -> Result<Vec<String>, PushError> {
        Ok(self
            .device_tokens
            .get(&(user_id.to_owned(), i32::from(platform_id)))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_provider_token(&self, _provider: &str) -> Result<Option<String>, PushError> {
        Ok(self.provider_token.lock().expect("lock").clone())
    }

    async fn set_provider_token(
        &self,
        _provider: &str,
        token: &str,
        _ttl_secs: i64,
    ) -> Result<(), PushError> {
        *self.provider_token.lock().expect("lock") = Some(token.to_owned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Offline pusher
// ---------------------------------------------------------------------------

/// One recorded offline-push delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflinePushRecord {
    pub user_ids: Vec<String>,
    pub title: String,
    pub content: String,
    pub opts: Opts,
}

#[derive(Default)]
pub struct MockOfflinePusher {
    fail: bool,
    calls: Mutex<Vec<OfflinePushRecord>>,
}

impl MockOfflinePusher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<OfflinePushRecord> {
        self.calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl OfflinePushProvider for MockOfflinePusher {
    async fn push(
        &self,
        user_ids: &[String],
        title: &str,
        content: &str,
        opts: &Opts,
    ) -> Result<(), PushError> {
        self.calls.lock().expect("lock").push(OfflinePushRecord {
            user_ids: user_ids.to_vec(),
            title: title.to_owned(),
            content: content.to_owned(),
            opts: opts.clone(),
        });
        if self.fail {
            return Err(PushError::OfflineProvider(
                "injected provider failure".to_owned(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Callback hooks
// ---------------------------------------------------------------------------

/// Recording callback with optional scripted behavior per hook.
#[derive(Default)]
pub struct RecordingCallback {
    veto_online: Option<String>,
    group_recipients: Option<Vec<String>>,
    offline_override: Option<Vec<String>>,
    online_calls: Mutex<Vec<Vec<String>>>,
    group_calls: Mutex<Vec<String>>,
    offline_calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pre-user-online hook refuses every push with `reason`.
    pub fn vetoing_online(mut self, reason: &str) -> Self {
        self.veto_online = Some(reason.to_owned());
        self
    }

    /// The pre-super-group hook supplies an explicit recipient list.
    pub fn with_group_recipients(mut self, users: &[&str]) -> Self {
        self.group_recipients = Some(users.iter().map(|u| (*u).to_owned()).collect());
        self
    }

    /// The offline hook overrides the target list.
    pub fn with_offline_override(mut self, users: &[&str]) -> Self {
        self.offline_override = Some(users.iter().map(|u| (*u).to_owned()).collect());
        self
    }

    pub fn online_calls(&self) -> Vec<Vec<String>> {
        self.online_calls.lock().expect("lock").clone()
    }

    pub fn group_calls(&self) -> Vec<String> {
        self.group_calls.lock().expect("lock").clone()
    }

    /// Target lists the offline hook was invoked with.
    pub fn offline_calls(&self) -> Vec<Vec<String>> {
        self.offline_calls.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PushCallback for RecordingCallback {
    async fn on_online_push(&self, _msg: &MsgData, user_ids: &[String]) -> Result<(), PushError> {
        self.online_calls.lock().expect("lock").push(user_ids.to_vec());
        match &self.veto_online {
            Some(reason) => Err(PushError::Callback(reason.clone())),
            None => Ok(()),
        }
    }

    async fn on_super_group_online_push(
        &self,
        group_id: &str,
        _msg: &MsgData,
    ) -> Result<Option<Vec<String>>, PushError> {
        self.group_calls.lock().expect("lock").push(group_id.to_owned());
        Ok(self.group_recipients.clone())
    }

    async fn on_offline_push(
        &self,
        _msg: &MsgData,
        user_ids: &[String],
    ) -> Result<Option<Vec<String>>, PushError> {
        self.offline_calls.lock().expect("lock").push(user_ids.to_vec());
        Ok(self.offline_override.clone())
    }
}
