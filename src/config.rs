//! Configuration
//!
//! Loaded from a TOML file with per-field defaults, then optionally
//! overridden from `BUSLENS_*` environment variables. The engine itself
//! only ever sees the plain numbers in [`EngineLimits`].

use crate::bus::PendingLimits;
use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "buslens";

/// Directory holding the config file and logs, relative to the home directory.
const CONFIG_DIR_NAME: &str = ".buslens";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub inspection: InspectionConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file; stderr when unset.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Where the bus lives.
///
/// Nothing in this crate connects: these settings are carried for the
/// caller that opens the session and hands the engine a [`Bus`].
///
/// [`Bus`]: crate::bus::Bus
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Full `host:port`; takes precedence over `url` and `port`.
    #[serde(default)]
    pub address: Option<String>,
}

fn default_url() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4222
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            port: default_port(),
            address: None,
        }
    }
}

impl ConnectionConfig {
    /// `host:port` the caller should connect to.
    pub fn address(&self) -> String {
        match &self.address {
            Some(address) if !address.is_empty() => address.clone(),
            _ => format!("{}:{}", self.url, self.port),
        }
    }
}

/// Wildcard discovery subscription limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_pending_limit")]
    pub pending_limit: usize,

    #[serde(default = "default_storage_limit_mb")]
    pub storage_limit_mb: usize,
}

fn default_pending_limit() -> usize {
    10_000
}

fn default_storage_limit_mb() -> usize {
    50
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            pending_limit: default_pending_limit(),
            storage_limit_mb: default_storage_limit_mb(),
        }
    }
}

/// Single-subject inspection limits.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InspectionConfig {
    /// Messages retained in the inspection window.
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,

    #[serde(default = "default_pending_limit")]
    pub pending_limit: usize,

    #[serde(default = "default_storage_limit_mb")]
    pub storage_limit_mb: usize,
}

fn default_message_limit() -> usize {
    100
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            message_limit: default_message_limit(),
            pending_limit: default_pending_limit(),
            storage_limit_mb: default_storage_limit_mb(),
        }
    }
}

/// The numeric limits handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineLimits {
    pub discovery_pending: PendingLimits,
    pub inspection_capacity: usize,
    pub inspection_pending: PendingLimits,
}

impl Default for EngineLimits {
    fn default() -> Self {
        MonitorConfig::default().limits()
    }
}

impl MonitorConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| MonitorError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| MonitorError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load from `path`, using defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = ?path, "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("BUSLENS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(url) = lookup("BUSLENS_URL") {
            self.connection.url = url;
        }
        if let Some(port) = lookup("BUSLENS_PORT") {
            match port.parse() {
                Ok(p) => self.connection.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid BUSLENS_PORT"),
            }
        }
        if let Some(address) = lookup("BUSLENS_ADDRESS") {
            self.connection.address = Some(address);
        }
    }

    /// Limits for the discovery and inspection feeds.
    pub fn limits(&self) -> EngineLimits {
        EngineLimits {
            discovery_pending: PendingLimits::from_megabytes(
                self.discovery.pending_limit,
                self.discovery.storage_limit_mb,
            ),
            inspection_capacity: self.inspection.message_limit,
            inspection_pending: PendingLimits::from_megabytes(
                self.inspection.pending_limit,
                self.inspection.storage_limit_mb,
            ),
        }
    }

    /// JSON rendering, for debug logging of the effective configuration.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `~/.buslens`, if a home directory is known.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}

/// `~/.buslens/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    let c = MonitorConfig::default();
    format!(
        r#"# {name} configuration
#
# Environment variables override these settings:
# - BUSLENS_LOG_LEVEL
# - BUSLENS_URL
# - BUSLENS_PORT
# - BUSLENS_ADDRESS

[logging]
# Log level: trace, debug, info, warn, error
level = "{level}"

# Optional log file path (stderr when unset)
# file = "~/.buslens/buslens.log"

[connection]
url = "{url}"
port = {port}
# address = "127.0.0.1:4222"  # full address, overrides url and port

[discovery]
# Pending limits for the wildcard subscription
pending_limit = {d_pending}
storage_limit_mb = {d_storage}

[inspection]
# Messages kept for the subject being inspected
message_limit = {i_messages}
pending_limit = {i_pending}
storage_limit_mb = {i_storage}
"#,
        name = APP_NAME,
        level = c.logging.level,
        url = c.connection.url,
        port = c.connection.port,
        d_pending = c.discovery.pending_limit,
        d_storage = c.discovery.storage_limit_mb,
        i_messages = c.inspection.message_limit,
        i_pending = c.inspection.pending_limit,
        i_storage = c.inspection.storage_limit_mb,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.connection.address(), "127.0.0.1:4222");
        assert_eq!(config.connection.address, None);

        let limits = config.limits();
        assert_eq!(limits.discovery_pending, PendingLimits::new(10_000, 50 * 1024 * 1024));
        assert_eq!(limits.inspection_capacity, 100);
        assert_eq!(limits.inspection_pending, PendingLimits::new(10_000, 50 * 1024 * 1024));
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let parsed: MonitorConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(parsed, MonitorConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[inspection]\nmessage_limit = 25\n\n[connection]\naddress = \"10.0.0.5:4333\"\n",
        )
        .unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.inspection.message_limit, 25);
        assert_eq!(config.inspection.pending_limit, 10_000);
        assert_eq!(config.connection.address(), "10.0.0.5:4333");
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = MonitorConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[discovery]\npending_limit = \"lots\"\n").unwrap();

        let result = MonitorConfig::load(&path);
        assert!(matches!(result, Err(MonitorError::Config { .. })));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BUSLENS_LOG_LEVEL", "debug"),
            ("BUSLENS_URL", "bus.internal"),
            ("BUSLENS_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let mut config = MonitorConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.connection.address(), "bus.internal:4222");
    }

    #[test]
    fn test_connection_settings_are_passed_through() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        // Retry keys from older files are ignored rather than rejected
        std::fs::write(
            &path,
            "[connection]\nurl = \"bus.internal\"\nport = 4333\nmax_reconnects = 5\n",
        )
        .unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.connection.address(), "bus.internal:4333");
        assert!(!generate_default_config().contains("reconnect"));

        let json = config.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["connection"].get("max_reconnects").is_none());
        assert_eq!(value["connection"]["port"], 4333);
    }

    #[test]
    fn test_default_paths_under_home() {
        if let (Some(dir), Some(path)) = (config_dir(), default_config_path()) {
            assert!(dir.ends_with(".buslens"));
            assert_eq!(path, dir.join("config.toml"));
        }
    }

    #[test]
    fn test_to_json() {
        let json = MonitorConfig::default().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["inspection"]["message_limit"], 100);
    }
}
