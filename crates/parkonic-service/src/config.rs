//! Configuration for the ticket tooling.
//!
//! Supports multiple configuration sources with precedence:
//! 1. Environment variables (highest priority)
//! 2. TOML configuration file
//! 3. Default values (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "parkonic.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ticket store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Ingestion and deduplication settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// MySQL dump settings
    #[serde(default)]
    pub dump: DumpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ticket store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database URL (default: "sqlite://tickets.db")
    #[serde(default = "default_db_url")]
    pub url: String,

    /// Max connections in pool (default: 8)
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in seconds (default: 5)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Connection timeout as a [`Duration`].
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }
}

/// Ingestion and deduplication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Match incoming tickets against stored sessions (default: true)
    #[serde(default = "default_true")]
    pub dedup_enabled: bool,

    /// Maximum distance between entry times of the same session, in seconds (default: 300)
    #[serde(default = "default_match_window")]
    pub match_window_secs: u64,
}

/// MySQL dump settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// Database name written into the dump (default: "parkonic_tickets")
    #[serde(default = "default_dump_database")]
    pub database_name: String,

    /// Output file name (default: "Dump_parkonic_tickets.sql")
    #[serde(default = "default_dump_file")]
    pub file_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty (default: "pretty")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_db_url() -> String {
    "sqlite://tickets.db".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_match_window() -> u64 {
    300
}

fn default_dump_database() -> String {
    parkonic_store::DEFAULT_DATABASE_NAME.to_string()
}

fn default_dump_file() -> String {
    "Dump_parkonic_tickets.sql".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
            connection_timeout_seconds: default_connection_timeout(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dedup_enabled: default_true(),
            match_window_secs: default_match_window(),
        }
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            database_name: default_dump_database(),
            file_name: default_dump_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError { path, source: e })
    }

    /// Load configuration with environment variable overrides, then validate.
    ///
    /// An explicit `path` must exist. Without one, `parkonic.toml` in the
    /// working directory is used when present, otherwise defaults.
    ///
    /// Supported environment variables:
    /// - `PARKONIC_DB_URL` - Database URL
    /// - `PARKONIC_MAX_CONNECTIONS` - Pool size
    /// - `PARKONIC_DEDUP_ENABLED` - Toggle deduplication
    /// - `PARKONIC_MATCH_WINDOW_SECS` - Dedup window
    /// - `PARKONIC_LOG_LEVEL` - Log level
    /// - `PARKONIC_LOG_FORMAT` - Log format
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PARKONIC_DB_URL") {
            self.database.url = url;
        }

        if let Ok(max) = std::env::var("PARKONIC_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                self.database.max_connections = max;
            }
        }

        if let Ok(enabled) = std::env::var("PARKONIC_DEDUP_ENABLED") {
            if let Ok(enabled) = enabled.parse() {
                self.ingest.dedup_enabled = enabled;
            }
        }

        if let Ok(window) = std::env::var("PARKONIC_MATCH_WINDOW_SECS") {
            if let Ok(window) = window.parse() {
                self.ingest.match_window_secs = window;
            }
        }

        if let Ok(level) = std::env::var("PARKONIC_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = std::env::var("PARKONIC_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url cannot be empty".to_string(),
            ));
        }

        if !self.database.url.starts_with("sqlite:") {
            return Err(ConfigError::ValidationError(format!(
                "database.url must be a sqlite URL, got `{}`",
                self.database.url
            )));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be > 0".to_string(),
            ));
        }

        if self.database.connection_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "database.connection_timeout_seconds must be > 0".to_string(),
            ));
        }

        if self.ingest.match_window_secs > 86_400 {
            return Err(ConfigError::ValidationError(
                "ingest.match_window_secs must be <= 86400".to_string(),
            ));
        }

        if self.dump.database_name.is_empty()
            || !self
                .dump
                .database_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::ValidationError(
                "dump.database_name must be a non-empty identifier of [A-Za-z0-9_]".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be one of: {}",
                valid_formats.join(", ")
            )));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file
    #[error("Failed to read config file {path:?}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML parsing error
    #[error("Failed to parse TOML in {path:?}: {source}")]
    TomlError {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Validation error
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
