//! GeTui offline-push client.
//!
//! Auth tokens are minted with a `sha256(app_key + millis + master_secret)`
//! signature and cached through the message-cache collaborator so that one
//! token serves the whole fleet.  Batch pushes first register the message
//! body as a task, then address the task to the alias list.

use super::{Opts, TokenCache};
use crate::config::GetuiConfig;
use crate::error::PushError;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const AUTH_PATH: &str = "/auth";
const SINGLE_PUSH_PATH: &str = "/push/single/alias";
const CREATE_TASK_PATH: &str = "/push/list/message";
const BATCH_PUSH_PATH: &str = "/push/list/alias";

/// GeTui rejects alias lists above this size; larger target sets are
/// chunked.
const MAX_ALIAS_BATCH: usize = 1000;

/// Cached-token lifetime; GeTui tokens are valid for a day.
const TOKEN_TTL_SECS: i64 = 60 * 60 * 23;

pub struct GetuiClient {
    cfg: GetuiConfig,
    cache: Arc<dyn TokenCache>,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GetuiResponse<T> {
    code: i32,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AuthData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    #[serde(rename = "taskid")]
    task_id: String,
}

impl GetuiClient {
    pub fn new(cfg: GetuiConfig, cache: Arc<dyn TokenCache>) -> Self {
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
        _opts: &Opts,
    ) -> Result<(), PushError> {
        let token = match self.cache.get_provider_token("getui").await? {
            Some(token) => token,
            None => self.refresh_token().await?,
        };

        let message = json!({
            "notification": {
                "title": title,
                "body": content,
                "channel_id": self.cfg.channel_id,
                "channel_name": self.cfg.channel_name,
                "click_type": "intent",
                "intent": self.cfg.intent,
            },
        });

        if user_ids.len() == 1 {
            let body = json!({
                "request_id": Uuid::new_v4().to_string(),
                "audience": { "alias": user_ids },
                "push_message": message,
            });
            self.post::<serde_json::Value>(SINGLE_PUSH_PATH, &token, &body)
                .await?;
            return Ok(());
        }

        // Batch: register the message once, then address it per chunk.
        let task_body = json!({
            "request_id": Uuid::new_v4().to_string(),
            "push_message": message,
        });
        let task: TaskData = self
            .post(CREATE_TASK_PATH, &token, &task_body)
            .await?
            .ok_or_else(|| {
                PushError::OfflineProvider("getui: task creation returned no data".to_owned())
            })?;
        for chunk in user_ids.chunks(MAX_ALIAS_BATCH) {
            let body = json!({
                "audience": { "alias": chunk },
                "taskid": task.task_id,
                "is_async": true,
            });
            self.post::<serde_json::Value>(BATCH_PUSH_PATH, &token, &body)
                .await?;
        }
        Ok(())
    }

    /// Mint a fresh auth token and publish it to the cache.
    async fn refresh_token(&self) -> Result<String, PushError> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let mut hasher = Sha256::new();
        hasher.update(self.cfg.app_key.as_bytes());
        hasher.update(timestamp.as_bytes());
        hasher.update(self.cfg.master_secret.as_bytes());
        let sign = format!("{:x}", hasher.finalize());

        let body = json!({
            "sign": sign,
            "timestamp": timestamp,
            "appkey": self.cfg.app_key,
        });
        let auth: AuthData = self.post(AUTH_PATH, "", &body).await?.ok_or_else(|| {
            PushError::OfflineProvider("getui: auth returned no data".to_owned())
        })?;
        debug!("getui auth token refreshed");
        if let Err(e) = self
            .cache
            .set_provider_token("getui", &auth.token, TOKEN_TTL_SECS)
            .await
        {
            // A cache miss just means the next push re-auths.
            warn!(error = %e, "failed to cache getui token");
        }
        Ok(auth.token)
    }

    /// POST a request and unwrap the `{code, msg, data}` envelope.  A
    /// non-zero code is a provider failure; `data` may legitimately be
    /// absent on fire-and-forget calls.
    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> Result<Option<T>, PushError> {
        let url = format!("{}{}", self.cfg.push_url, path);
        let mut request = self.http.post(&url).json(body);
        if !token.is_empty() {
            request = request.header("token", token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PushError::OfflineProvider(format!("getui {}: {}", path, e)))?;
        let envelope: GetuiResponse<T> = response
            .json()
            .await
            .map_err(|e| PushError::OfflineProvider(format!("getui {}: {}", path, e)))?;
        if envelope.code != 0 {
            return Err(PushError::OfflineProvider(format!(
                "getui {}: code {} ({})",
                path, envelope.code, envelope.msg
            )));
        }
        Ok(envelope.data)
    }
}
