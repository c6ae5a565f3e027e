//! Push-service configuration loading.
//!
//! TOML is the sole config source.  Provider credentials live in
//! `[push.getui]` / `[push.fcm]` / `[push.jpush]` sub-tables; the active
//! provider is selected by `push.enable`, and an empty or unrecognized
//! value selects the no-op dummy adapter.
//!
//! # Topology
//! `topology = "zookeeper"` (flat service mesh, the default) or
//! `topology = "k8s"` (sharded-by-user cluster).

use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Config types (validated)
// ---------------------------------------------------------------------------

/// Deployment topology of the message gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Every gateway serves every user; fan out to all of them.
    Flat,
    /// Each user is pinned to one gateway by hash; fan out per shard.
    Sharded,
}

/// Top-level push-service configuration.
#[derive(Debug, Clone)]
pub struct PushServiceConfig {
    pub topology: Topology,
    /// Service-discovery key under which gateways register.
    pub gateway_service_name: String,
    pub push: PushConfig,
    /// Operator identities used for group-dismiss teardown; the first
    /// manager wins, the first IM admin is the fallback.
    pub manager_user_ids: Vec<String>,
    pub admin_user_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Offline-push provider selector: "getui", "fcm", "jpush" or other
    /// (dummy).
    pub enable: String,
    /// Fan-out concurrency cap; values below 3 are raised to 3 at use.
    pub max_concurrent_workers: usize,
    pub getui: Option<GetuiConfig>,
    pub fcm: Option<FcmConfig>,
    pub jpush: Option<JpushConfig>,
}

#[derive(Debug, Clone)]
pub struct GetuiConfig {
    pub push_url: String,
    pub app_key: String,
    pub master_secret: String,
    /// Click intent template forwarded in the Android payload.
    pub intent: String,
    pub channel_id: String,
    pub channel_name: String,
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub push_url: String,
    pub server_key: String,
}

#[derive(Debug, Clone)]
pub struct JpushConfig {
    pub push_url: String,
    pub app_key: String,
    pub master_secret: String,
    /// APNs production flag (`false` targets the sandbox environment).
    pub production: bool,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types (with Option for optional fields)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawConfig {
    topology: Option<String>,
    gateway_service_name: Option<String>,
    push: Option<RawPushConfig>,
    manager: Option<RawOperatorConfig>,
    im_admin: Option<RawOperatorConfig>,
}

#[derive(Debug, Deserialize)]
struct RawPushConfig {
    enable: Option<String>,
    max_concurrent_workers: Option<usize>,
    getui: Option<RawGetuiConfig>,
    fcm: Option<RawFcmConfig>,
    jpush: Option<RawJpushConfig>,
}

#[derive(Debug, Deserialize)]
struct RawOperatorConfig {
    user_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawGetuiConfig {
    push_url: Option<String>,
    app_key: Option<String>,
    master_secret: Option<String>,
    intent: Option<String>,
    channel_id: Option<String>,
    channel_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFcmConfig {
    push_url: Option<String>,
    server_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawJpushConfig {
    push_url: Option<String>,
    app_key: Option<String>,
    master_secret: Option<String>,
    production: Option<bool>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load push-service config from a file.
pub fn load_config_from_path(path: &Path) -> Result<PushServiceConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

/// Load push-service config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<PushServiceConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let topology = match raw.topology.as_deref().unwrap_or("zookeeper") {
        "zookeeper" => Topology::Flat,
        "k8s" => Topology::Sharded,
        other => {
            return Err(ConfigError::InvalidValue(format!(
                "topology must be \"zookeeper\" or \"k8s\", got \"{}\"",
                other
            )));
        }
    };

    let gateway_service_name = raw
        .gateway_service_name
        .unwrap_or_else(|| "msg-gateway".to_owned());

    let raw_push = raw.push.unwrap_or(RawPushConfig {
        enable: None,
        max_concurrent_workers: None,
        getui: None,
        fcm: None,
        jpush: None,
    });

    let enable = raw_push.enable.unwrap_or_default();
    let push = PushConfig {
        getui: raw_push.getui.map(validate_getui).transpose()?,
        fcm: raw_push.fcm.map(validate_fcm).transpose()?,
        jpush: raw_push.jpush.map(validate_jpush).transpose()?,
        max_concurrent_workers: raw_push.max_concurrent_workers.unwrap_or(3),
        enable,
    };

    // An enabled provider must come with its credentials table.
    match push.enable.as_str() {
        "getui" if push.getui.is_none() => {
            return Err(ConfigError::MissingField("push.getui".to_owned()));
        }
        "fcm" if push.fcm.is_none() => {
            return Err(ConfigError::MissingField("push.fcm".to_owned()));
        }
        "jpush" if push.jpush.is_none() => {
            return Err(ConfigError::MissingField("push.jpush".to_owned()));
        }
        _ => {}
    }

    Ok(PushServiceConfig {
        topology,
        gateway_service_name,
        push,
        manager_user_ids: raw.manager.and_then(|m| m.user_ids).unwrap_or_default(),
        admin_user_ids: raw.im_admin.and_then(|a| a.user_ids).unwrap_or_default(),
    })
}

fn validate_getui(raw: RawGetuiConfig) -> Result<GetuiConfig, ConfigError> {
    Ok(GetuiConfig {
        push_url: raw
            .push_url
            .unwrap_or_else(|| "https://restapi.getui.com/v2".to_owned()),
        app_key: raw
            .app_key
            .ok_or_else(|| ConfigError::MissingField("push.getui.app_key".to_owned()))?,
        master_secret: raw
            .master_secret
            .ok_or_else(|| ConfigError::MissingField("push.getui.master_secret".to_owned()))?,
        intent: raw.intent.unwrap_or_default(),
        channel_id: raw.channel_id.unwrap_or_default(),
        channel_name: raw.channel_name.unwrap_or_default(),
    })
}

fn validate_fcm(raw: RawFcmConfig) -> Result<FcmConfig, ConfigError> {
    Ok(FcmConfig {
        push_url: raw
            .push_url
            .unwrap_or_else(|| "https://fcm.googleapis.com/fcm/send".to_owned()),
        server_key: raw
            .server_key
            .ok_or_else(|| ConfigError::MissingField("push.fcm.server_key".to_owned()))?,
    })
}

fn validate_jpush(raw: RawJpushConfig) -> Result<JpushConfig, ConfigError> {
    Ok(JpushConfig {
        push_url: raw
            .push_url
            .unwrap_or_else(|| "https://api.jpush.cn/v3/push".to_owned()),
        app_key: raw
            .app_key
            .ok_or_else(|| ConfigError::MissingField("push.jpush.app_key".to_owned()))?,
        master_secret: raw
            .master_secret
            .ok_or_else(|| ConfigError::MissingField("push.jpush.master_secret".to_owned()))?,
        production: raw.production.unwrap_or(false),
    })
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
            ConfigError::MissingField(s) => write!(f, "Missing required field: {}", s),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}
