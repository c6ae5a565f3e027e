//! JPush offline-push client (v3 push API, basic auth).
//!
//! Recipients are addressed by alias (user ID); the iOS leg carries the
//! configured APNs environment plus sound/badge from the push options.

use super::Opts;
use crate::config::JpushConfig;
use crate::error::PushError;
use serde_json::json;

pub struct JpushClient {
    cfg: JpushConfig,
    http: reqwest::Client,
}

impl JpushClient {
    pub fn new(cfg: JpushConfig) -> Self {
        Self {
            cfg,
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
        let mut ios = json!({
            "alert": { "title": title, "body": content },
            "mutable-content": true,
        });
        if !opts.ios_push_sound.is_empty() {
            ios["sound"] = json!(opts.ios_push_sound);
        }
        if opts.ios_badge_count {
            ios["badge"] = json!("+1");
        }

        let body = json!({
            "platform": "all",
            "audience": { "alias": user_ids },
            "notification": {
                "android": { "alert": content, "title": title, "extras": { "ex": opts.ex } },
                "ios": ios,
            },
            "options": { "apns_production": self.cfg.production },
        });

        let response = self
            .http
            .post(&self.cfg.push_url)
            .basic_auth(&self.cfg.app_key, Some(&self.cfg.master_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| PushError::OfflineProvider(format!("jpush: {}", e)))?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(PushError::OfflineProvider(format!(
                "jpush: http status {} ({})",
                status, detail
            )));
        }
        Ok(())
    }
}
