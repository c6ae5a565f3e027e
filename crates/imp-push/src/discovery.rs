//! Gateway-plane contracts.
//!
//! The registry and the gateways themselves are owned by the service
//! discovery layer; this subsystem only borrows connections through these
//! capabilities.  Gateway handles are cheap to clone and safe for
//! concurrent RPCs.

use crate::error::PushError;
use async_trait::async_trait;
use imp_protocol::{OnlineBatchPushRequest, UserPushResult};
use std::sync::Arc;

/// One message-gateway endpoint.
#[async_trait]
pub trait MsgGateway: Send + Sync {
    /// Push one message to a batch of users.  The gateway answers only for
    /// users it actually holds connections for; an empty result is normal.
    async fn online_batch_push(
        &self,
        req: OnlineBatchPushRequest,
    ) -> Result<Vec<UserPushResult>, PushError>;
}

/// Service-discovery view of the gateway fleet.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// All gateway endpoints registered under `service_name` (flat mode).
    async fn get_conns(&self, service_name: &str) -> Result<Vec<Arc<dyn MsgGateway>>, PushError>;

    /// Host responsible for `user_id` under consistent hashing (sharded mode).
    async fn get_user_hash_gateway_host(&self, user_id: &str) -> Result<String, PushError>;

    /// Endpoint for a previously resolved host (sharded mode).
    async fn get_conn(&self, host: &str) -> Result<Arc<dyn MsgGateway>, PushError>;
}
