//! Offline-push adapters.
//!
//! One provider is selected at construction from `push.enable` and stays
//! fixed for the process lifetime.  Every provider exposes the same
//! lowest-common-denominator `push(user_ids, title, content, opts)` call;
//! vendor-specific payload shaping happens inside each client.

use crate::config::{ConfigError, PushConfig};
use crate::error::PushError;
use async_trait::async_trait;
use imp_protocol::PlatformId;
use std::sync::Arc;

pub mod dummy;
pub mod fcm;
pub mod getui;
pub mod jpush;

pub use dummy::DummyClient;
pub use fcm::FcmClient;
pub use getui::GetuiClient;
pub use jpush::JpushClient;

// ---------------------------------------------------------------------------
// Push options
// ---------------------------------------------------------------------------

/// Signaling correlation data carried alongside a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signal {
    pub client_msg_id: String,
}

/// Provider-independent push options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Opts {
    pub signal: Signal,
    pub ios_badge_count: bool,
    pub ios_push_sound: String,
    /// Opaque extension payload forwarded to the provider untouched.
    pub ex: String,
}

// ---------------------------------------------------------------------------
// Collaborator: token cache
// ---------------------------------------------------------------------------

/// Message-cache collaborator used by providers for token storage.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Device tokens registered by `user_id` on `platform_id`.
    async fn get_device_tokens(
        &self,
        user_id: &str,
        platform_id: PlatformId,
    ) -> Result<Vec<String>, PushError>;

    /// Cached provider auth token, if still live.
    async fn get_provider_token(&self, provider: &str) -> Result<Option<String>, PushError>;

    async fn set_provider_token(
        &self,
        provider: &str,
        token: &str,
        ttl_secs: i64,
    ) -> Result<(), PushError>;
}

// ---------------------------------------------------------------------------
// Provider capability + tagged variants
// ---------------------------------------------------------------------------

/// The single operation every offline-push provider exposes.
#[async_trait]
pub trait OfflinePushProvider: Send + Sync {
    async fn push(
        &self,
        user_ids: &[String],
        title: &str,
        content: &str,
        opts: &Opts,
    ) -> Result<(), PushError>;
}

/// The configured offline-push adapter.
///
/// Immutable after construction; the variant is fixed for the process
/// lifetime.
pub enum OfflinePusher {
    Getui(GetuiClient),
    Fcm(FcmClient),
    Jpush(JpushClient),
    Dummy(DummyClient),
}

impl OfflinePusher {
    /// Build the adapter selected by `push.enable`.  Unrecognized (or
    /// empty) selectors fall back to the no-op dummy.
    pub fn from_config(cfg: &PushConfig, cache: Arc<dyn TokenCache>) -> Result<Self, ConfigError> {
        match cfg.enable.as_str() {
            "getui" => {
                let getui = cfg
                    .getui
                    .clone()
                    .ok_or_else(|| ConfigError::MissingField("push.getui".to_owned()))?;
                Ok(OfflinePusher::Getui(GetuiClient::new(getui, cache)))
            }
            "fcm" => {
                let fcm = cfg
                    .fcm
                    .clone()
                    .ok_or_else(|| ConfigError::MissingField("push.fcm".to_owned()))?;
                Ok(OfflinePusher::Fcm(FcmClient::new(fcm, cache)))
            }
            "jpush" => {
                let jpush = cfg
                    .jpush
                    .clone()
                    .ok_or_else(|| ConfigError::MissingField("push.jpush".to_owned()))?;
                Ok(OfflinePusher::Jpush(JpushClient::new(jpush)))
            }
            _ => Ok(OfflinePusher::Dummy(DummyClient::new())),
        }
    }

    /// The variant name, for logging.
    pub fn provider_name(&self) -> &'static str {
        match self {
            OfflinePusher::Getui(_) => "getui",
            OfflinePusher::Fcm(_) => "fcm",
            OfflinePusher::Jpush(_) => "jpush",
            OfflinePusher::Dummy(_) => "dummy",
        }
    }
}

#[async_trait]
impl OfflinePushProvider for OfflinePusher {
    async fn push(
        &self,
        user_ids: &[String],
        title: &str,
        content: &str,
        opts: &Opts,
    ) -> Result<(), PushError> {
        match self {
            OfflinePusher::Getui(c) => c.push(user_ids, title, content, opts).await,
            OfflinePusher::Fcm(c) => c.push(user_ids, title, content, opts).await,
            OfflinePusher::Jpush(c) => c.push(user_ids, title, content, opts).await,
            OfflinePusher::Dummy(c) => c.push(user_ids, title, content, opts).await,
        }
    }
}
