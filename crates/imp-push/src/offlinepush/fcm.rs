//! FCM offline-push client (legacy HTTP API, server-key auth).
//!
//! Recipients are resolved to device registration tokens through the
//! message-cache collaborator; users without registered tokens are
//! silently skipped.

use super::{Opts, TokenCache};
use crate::config::FcmConfig;
use crate::error::PushError;
use imp_protocol::PlatformId;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// FCM caps `registration_ids` at 1000 per request.
const MAX_TOKEN_BATCH: usize = 1000;

/// Platforms that register FCM device tokens.
const TOKEN_PLATFORMS: [PlatformId; 2] = [PlatformId::Ios, PlatformId::Android];

pub struct FcmClient {
    cfg: FcmConfig,
    cache: Arc<dyn TokenCache>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: i64,
    #[serde(default)]
    failure: i64,
}

impl FcmClient {
    pub fn new(cfg: FcmConfig, cache: Arc<dyn TokenCache>) -> Self {
        Self {
            cfg,
            cache,
            http: reqwest::Client::new(),
        }
    }

    pub async fn push(
        &self,
        user_ids: &[String],
        title: &str,
        content: &str,
        opts: &Opts,
    ) -> Result<(), PushError> {
        let mut tokens = Vec::new();
        for user_id in user_ids {
            for platform in TOKEN_PLATFORMS {
                match self.cache.get_device_tokens(user_id, platform).await {
                    Ok(device_tokens) => tokens.extend(device_tokens),
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "fcm token lookup failed");
                    }
                }
            }
        }
        if tokens.is_empty() {
            debug!(users = user_ids.len(), "fcm push skipped: no registered device tokens");
            return Ok(());
        }

        let mut notification = json!({
            "title": title,
            "body": content,
        });
        if !opts.ios_push_sound.is_empty() {
            notification["sound"] = json!(opts.ios_push_sound);
        }

        for chunk in tokens.chunks(MAX_TOKEN_BATCH) {
            let body = json!({
                "registration_ids": chunk,
                "notification": notification.clone(),
                "data": { "ex": opts.ex },
                "priority": "high",
                "content_available": true,
            });
            let response = self
                .http
                .post(&self.cfg.push_url)
                .header("Authorization", format!("key={}", self.cfg.server_key))
                .json(&body)
                .send()
                .await
                .map_err(|e| PushError::OfflineProvider(format!("fcm: {}", e)))?;
            if !response.status().is_success() {
                return Err(PushError::OfflineProvider(format!(
                    "fcm: http status {}",
                    response.status()
                )));
            }
            let result: FcmResponse = response
                .json()
                .await
                .map_err(|e| PushError::OfflineProvider(format!("fcm: {}", e)))?;
            if result.failure > 0 {
                warn!(success = result.success, failure = result.failure, "fcm partial failure");
            }
        }
        Ok(())
    }
}
