//! Configuration resolution for Helpdesk.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Config file (`--config` path, else `~/.config/helpdesk/config.toml`)
//! 3. Environment variables (`HELPDESK_*`)
//! 4. CLI arguments (applied by the binary, highest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Development-only signing secret; the server warns when it is still in use.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Complete Helpdesk configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub linking: LinkingConfig,
    pub notifications: NotificationConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub database_path: Option<PathBuf>,
    pub log_level: String,
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            log_level: "info".to_string(),
            max_connections: 5,
        }
    }
}

/// Session token settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            session_ttl_secs: 24 * 60 * 60, // 1 day
        }
    }
}

/// Chat-account linking settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LinkingConfig {
    /// Lifetime of a link token. Default: 15 minutes.
    pub token_ttl_secs: i64,
}

impl Default for LinkingConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 15 * 60,
        }
    }
}

/// Chat notification settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Bound of the in-process dispatch queue; overflow is dropped.
    pub queue_capacity: usize,
    pub telegram_api_url: String,
    /// When unset the bot poller is disabled and messages are only logged.
    pub telegram_bot_token: Option<String>,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            telegram_api_url: "https://api.telegram.org".to_string(),
            telegram_bot_token: None,
            poll_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(Error::Config("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.session_ttl_secs <= 0 {
            return Err(Error::Config("auth.session_ttl_secs must be positive".into()));
        }
        if self.linking.token_ttl_secs <= 0 {
            return Err(Error::Config("linking.token_ttl_secs must be positive".into()));
        }
        if self.notifications.queue_capacity == 0 {
            return Err(Error::Config(
                "notifications.queue_capacity must be at least 1".into(),
            ));
        }
        if self.server.max_connections == 0 {
            return Err(Error::Config("server.max_connections must be at least 1".into()));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
///
/// An explicit `path` must exist; the global config file is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_config_file(p)?,
        None => match global_config_path() {
            Some(global) if global.exists() => load_config_file(&global)?,
            _ => Config::default(),
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
        .map(|p| p.join("helpdesk").join("config.toml"))
}

/// Default database location when none is configured.
pub fn default_database_path() -> Option<PathBuf> {
    std::env::var("XDG_DATA_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".local").join("share"))
        })
        .map(|p| p.join("helpdesk").join("helpdesk.db"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `HELPDESK_*` overrides read through `lookup`.
///
/// Unparseable numeric values are ignored and the previous value is kept.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("HELPDESK_DATABASE_PATH") {
        config.server.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("HELPDESK_LOG_LEVEL") {
        config.server.log_level = val;
    }
    if let Some(val) = lookup("HELPDESK_JWT_SECRET") {
        config.auth.jwt_secret = val;
    }
    if let Some(n) = lookup("HELPDESK_SESSION_TTL_SECS").and_then(|v| v.parse().ok()) {
        config.auth.session_ttl_secs = n;
    }
    if let Some(n) = lookup("HELPDESK_LINK_TOKEN_TTL_SECS").and_then(|v| v.parse().ok()) {
        config.linking.token_ttl_secs = n;
    }
    if let Some(n) = lookup("HELPDESK_NOTIFY_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
        config.notifications.queue_capacity = n;
    }
    if let Some(val) = lookup("HELPDESK_TELEGRAM_API_URL") {
        config.notifications.telegram_api_url = val;
    }
    if let Some(val) = lookup("HELPDESK_TELEGRAM_BOT_TOKEN") {
        config.notifications.telegram_bot_token = Some(val).filter(|t| !t.is_empty());
    }
}
