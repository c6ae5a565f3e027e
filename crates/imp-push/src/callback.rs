//! Extension hooks invoked around the push pipeline.
//!
//! Hooks may veto a push (by returning an error) or rewrite the recipient
//! list (by returning a replacement).  A returned `None` means "no
//! opinion, keep the caller's list"; a returned empty list is treated the
//! same way.

use crate::error::PushError;
use async_trait::async_trait;
use imp_protocol::MsgData;

#[async_trait]
pub trait PushCallback: Send + Sync {
    /// Before the online fan-out of a user-addressed message.
    async fn on_online_push(&self, _msg: &MsgData, _user_ids: &[String]) -> Result<(), PushError> {
        Ok(())
    }

    /// Before the online fan-out of a group message.  May supply the
    /// recipient list, bypassing group-membership resolution.
    async fn on_super_group_online_push(
        &self,
        _group_id: &str,
        _msg: &MsgData,
    ) -> Result<Option<Vec<String>>, PushError> {
        Ok(None)
    }

    /// Before the offline push.  May override the target list.
    async fn on_offline_push(
        &self,
        _msg: &MsgData,
        _user_ids: &[String],
    ) -> Result<Option<Vec<String>>, PushError> {
        Ok(None)
    }
}

/// Hook implementation that approves everything and changes nothing.
pub struct NoopCallback;

#[async_trait]
impl PushCallback for NoopCallback {}
