use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Credential, DEFAULT_APP_ID, select_credential};

/// Settings for one push platform, either global or per application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Credential bundle; takes precedence over `api_key` when non-empty.
    #[serde(default)]
    pub credentials: Option<String>,

    /// Default retry ceiling for this platform. Only the global value is
    /// read; tenant sections inherit it.
    #[serde(default)]
    pub max_retry: u32,

    /// Endpoint of the delivery gateway the platform client talks to.
    #[serde(default)]
    pub gateway_url: Option<String>,
}

impl PlatformConfig {
    /// The statically configured credential, if any.
    pub fn credential(&self) -> Option<Credential> {
        select_credential(self.api_key.as_deref(), self.credentials.as_deref())
    }
}

/// Per-tenant configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    pub app_id: u32,

    #[serde(default)]
    pub android: PlatformConfig,

    #[serde(default)]
    pub ios: PlatformConfig,
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port (default: 3000)
    pub port: u16,

    /// Number of dispatch workers (default: available parallelism)
    pub worker_num: usize,

    /// Capacity of the pending job queue (default: 8192)
    pub queue_num: usize,

    /// Block each batch submission until every notification completes
    pub sync: bool,

    /// Destination for failed-recipient callbacks in async mode
    pub feedback_url: Option<String>,

    /// Feedback request timeout in seconds (default: 10)
    pub feedback_timeout_secs: u64,

    /// Capacity of the outbound feedback queue (default: 1024)
    pub feedback_queue_size: usize,

    /// Redis connection string for the token blacklist
    pub blacklist_redis_url: Option<String>,

    /// Global Android settings, used for app ID 0
    pub android: PlatformConfig,

    /// Global iOS settings, used for app ID 0
    pub ios: PlatformConfig,

    /// Configured tenants
    pub apps: Vec<ApplicationConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            worker_num: default_worker_num(),
            queue_num: 8192,
            sync: false,
            feedback_url: None,
            feedback_timeout_secs: 10,
            feedback_queue_size: 1024,
            blacklist_redis_url: None,
            android: PlatformConfig::default(),
            ios: PlatformConfig::default(),
            apps: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let apps = match std::env::var("APPS_CONFIG_PATH") {
            Ok(path) => load_applications(&path)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            port: parse_var("PORT", 3000)?,
            worker_num: parse_var("WORKER_NUM", default_worker_num())?,
            queue_num: parse_var("QUEUE_NUM", 8192)?,
            sync: parse_var("SYNC_MODE", false)?,
            feedback_url: non_empty_var("FEEDBACK_URL"),
            feedback_timeout_secs: parse_var("FEEDBACK_TIMEOUT_SECS", 10)?,
            feedback_queue_size: parse_var("FEEDBACK_QUEUE_SIZE", 1024)?,
            blacklist_redis_url: non_empty_var("BLACKLIST_REDIS_URL"),
            android: platform_from_env("ANDROID")?,
            ios: platform_from_env("IOS")?,
            apps,
        })
    }
}

/// Read the tenant list from a JSON file.
pub fn load_applications(path: &str) -> anyhow::Result<Vec<ApplicationConfig>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read APPS_CONFIG_PATH {}: {}", path, e))?;
    parse_applications(&raw)
}

fn parse_applications(raw: &str) -> anyhow::Result<Vec<ApplicationConfig>> {
    let apps: Vec<ApplicationConfig> = serde_json::from_str(raw)?;
    if let Some(app) = apps.iter().find(|app| app.app_id == DEFAULT_APP_ID) {
        anyhow::bail!(
            "application id {} is reserved for the global configuration",
            app.app_id
        );
    }
    Ok(apps)
}

fn platform_from_env(prefix: &str) -> anyhow::Result<PlatformConfig> {
    Ok(PlatformConfig {
        enabled: parse_var(&format!("{prefix}_ENABLED"), false)?,
        api_key: non_empty_var(&format!("{prefix}_API_KEY")),
        credentials: non_empty_var(&format!("{prefix}_CREDENTIALS")),
        max_retry: parse_var(&format!("{prefix}_MAX_RETRY"), 0)?,
        gateway_url: non_empty_var(&format!("{prefix}_GATEWAY_URL")),
    })
}

fn parse_var<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                key,
                std::any::type_name::<T>()
            )
        }),
        Err(_) => Ok(default),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn default_worker_num() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_applications() {
        let apps = parse_applications(
            r#"[
                {"app_id": 7, "android": {"enabled": true, "api_key": "k7", "max_retry": 2}},
                {"app_id": 9, "ios": {"enabled": true, "credentials": "bundle", "api_key": "ignored"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(apps.len(), 2);
        assert_eq!(
            apps[0].android.credential(),
            Some(Credential::ApiKey("k7".to_string()))
        );
        assert!(!apps[0].ios.enabled);
        assert_eq!(
            apps[1].ios.credential(),
            Some(Credential::Bundle("bundle".to_string()))
        );
    }

    #[test]
    fn test_reserved_app_id_rejected() {
        assert!(parse_applications(r#"[{"app_id": 0}]"#).is_err());
    }
}
