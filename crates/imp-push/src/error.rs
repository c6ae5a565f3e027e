//! Subsystem error type.
//!
//! One fatal error aborts a push pipeline.  Non-fatal conditions
//! (per-endpoint gateway failures, side-effect failures, bad lifecycle
//! payloads) are logged at their site and never surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    /// Endpoint enumeration or shard lookup failed before any RPC was issued.
    #[error("discovery: {0}")]
    Discovery(String),
    /// An extension hook refused the push.
    #[error("callback rejected push: {0}")]
    Callback(String),
    /// The offline path was required but no adapter is configured.
    #[error("no offline pusher is configured")]
    NoOfflinePusher,
    /// The offline-push provider rejected or failed the delivery.
    #[error("offline provider: {0}")]
    OfflineProvider(String),
    /// A collaborator service RPC failed.
    #[error("rpc: {0}")]
    Rpc(String),
    /// Notification content did not decode.
    #[error("malformed notification content: {0}")]
    MalformedContent(#[from] serde_json::Error),
}
