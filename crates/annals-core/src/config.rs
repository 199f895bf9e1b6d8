//! Configuration loading and typed config structures for the Annals event log.
//!
//! The canonical configuration lives in `annals-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads the file and applies
//! environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use annals_db::SqliteConfig;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `annals-config.yaml`. Every field has a
/// default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AnnalsConfig {
    /// Where session stores live and how they are opened.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session bound at startup.
    #[serde(default)]
    pub session: SessionConfig,

    /// History API server settings.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AnnalsConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `ANNALS_SAVES_DIR` overrides `storage.saves_dir`
    /// - `ANNALS_SESSION` overrides `session.name`
    /// - `ANNALS_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override settings with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("ANNALS_SAVES_DIR") {
            self.storage.saves_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("ANNALS_SESSION") {
            self.session.name = Some(val).filter(|name| !name.is_empty());
        }
        if let Some(val) = lookup("ANNALS_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.observer.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "Ignoring invalid ANNALS_PORT"),
            }
        }
    }
}

/// Session store location and `SQLite` tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Directory holding world snapshots and their event stores.
    #[serde(default = "default_saves_dir")]
    pub saves_dir: PathBuf,

    /// Connections per session store.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Milliseconds a statement waits on a locked store.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Milliseconds to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl StorageConfig {
    /// Store options for the file at `path` with this tuning.
    pub fn sqlite_config(&self, path: impl Into<PathBuf>) -> SqliteConfig {
        SqliteConfig::new(path)
            .with_max_connections(self.max_connections)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_acquire_timeout(Duration::from_millis(self.acquire_timeout_ms))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            saves_dir: default_saves_dir(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

/// Session bound when the engine starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Save slot name. When absent the engine serves without a session.
    #[serde(default)]
    pub name: Option<String>,
}

/// History API server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Page size used when a request gives no `limit`.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Largest page a request may ask for; larger limits are clamped.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_saves_dir() -> PathBuf {
    PathBuf::from("saves")
}

const fn default_max_connections() -> u32 {
    4
}

const fn default_busy_timeout_ms() -> u64 {
    1_000
}

const fn default_acquire_timeout_ms() -> u64 {
    2_000
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_page_size() -> u32 {
    100
}

const fn default_max_page_size() -> u32 {
    1_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_without_env(yaml: &str) -> AnnalsConfig {
        let config: AnnalsConfig = serde_yml::from_str(yaml).ok().unwrap_or_default();
        config
    }

    #[test]
    fn default_config_is_valid() {
        let config = AnnalsConfig::default();
        assert_eq!(config.storage.saves_dir, PathBuf::from("saves"));
        assert_eq!(config.storage.max_connections, 4);
        assert_eq!(config.session.name, None);
        assert_eq!(config.observer.port, 8080);
        assert_eq!(config.observer.default_page_size, 100);
        assert_eq!(config.observer.max_page_size, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
storage:
  saves_dir: "/var/lib/annals"
  max_connections: 2
  busy_timeout_ms: 250
  acquire_timeout_ms: 500

session:
  name: "save_20260105_1423"

observer:
  host: "127.0.0.1"
  port: 9090
  default_page_size: 50
  max_page_size: 200

logging:
  level: "debug"
  json: true
"#;
        let config = parse_without_env(yaml);

        assert_eq!(config.storage.saves_dir, PathBuf::from("/var/lib/annals"));
        assert_eq!(config.storage.busy_timeout_ms, 250);
        assert_eq!(config.session.name.as_deref(), Some("save_20260105_1423"));
        assert_eq!(config.observer.host, "127.0.0.1");
        assert_eq!(config.observer.max_page_size, 200);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = parse_without_env("observer:\n  port: 7000\n");

        assert_eq!(config.observer.port, 7000);
        // Everything else uses defaults
        assert_eq!(config.observer.default_page_size, 100);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(AnnalsConfig::parse("").is_ok());
    }

    #[test]
    fn overrides_replace_yaml_values() {
        let mut config = parse_without_env("observer:\n  port: 7000\n");
        config.apply_overrides(|key| match key {
            "ANNALS_SAVES_DIR" => Some("/tmp/saves".to_owned()),
            "ANNALS_SESSION" => Some("slot_2".to_owned()),
            "ANNALS_PORT" => Some("8181".to_owned()),
            _ => None,
        });

        assert_eq!(config.storage.saves_dir, PathBuf::from("/tmp/saves"));
        assert_eq!(config.session.name.as_deref(), Some("slot_2"));
        assert_eq!(config.observer.port, 8181);
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = AnnalsConfig::default();
        config.apply_overrides(|key| (key == "ANNALS_PORT").then(|| "not-a-port".to_owned()));
        assert_eq!(config.observer.port, 8080);
    }

    #[test]
    fn storage_tuning_flows_into_store_options() {
        let storage = StorageConfig {
            busy_timeout_ms: 10,
            ..StorageConfig::default()
        };
        let sqlite = storage.sqlite_config("x_events.db");
        assert_eq!(sqlite.busy_timeout, Duration::from_millis(10));
        assert_eq!(sqlite.max_connections, 4);
        assert_eq!(sqlite.path, PathBuf::from("x_events.db"));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("annals-config.yaml");
        if path.exists() {
            let config = AnnalsConfig::from_file(&path);
            assert!(config.is_ok());
        }
    }
}
