//! Collaborator service contracts consumed by the dispatcher.
//!
//! All of these are remote services (or process-local caches owned by
//! other modules); the dispatcher treats them as read-mostly capabilities
//! and never manages their lifecycle.

use crate::error::PushError;
use async_trait::async_trait;

/// Conversation metadata service.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Filter `user_ids` down to those who have offline push enabled for
    /// the conversation (drops recipients who muted it).
    async fn get_conversation_offline_push_user_ids(
        &self,
        conversation_id: &str,
        user_ids: &[String],
    ) -> Result<Vec<String>, PushError>;

    /// Fast-forward `user_ids` past all messages up to `max_seq`.
    async fn set_conversation_max_seq(
        &self,
        user_ids: &[String],
        conversation_id: &str,
        max_seq: i64,
    ) -> Result<(), PushError>;
}

/// Message store / sequence service.
#[async_trait]
pub trait MessageApi: Send + Sync {
    async fn get_conversation_max_seq(&self, conversation_id: &str) -> Result<i64, PushError>;
}

/// Group service.
#[async_trait]
pub trait GroupApi: Send + Sync {
    /// Tear down a dismissed group.  `op_user_id` is the operator identity
    /// the call runs under (may be empty when no manager is configured).
    async fn dismiss_group(&self, op_user_id: &str, group_id: &str) -> Result<(), PushError>;
}

/// Process-local group-membership cache.
#[async_trait]
pub trait GroupMemberCache: Send + Sync {
    async fn group_member_ids(&self, group_id: &str) -> Result<Vec<String>, PushError>;
}
