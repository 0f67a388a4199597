//! Configuration management for tabledump
//!
//! This module handles loading, parsing, and managing configuration from:
//! - Configuration files (TOML format)
//! - Command-line arguments (applied by the CLI layer)
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export pipeline configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// MongoDB connection URI
    #[serde(default = "default_uri")]
    pub uri: String,

    /// Database holding the exported tables
    #[serde(default = "default_database")]
    pub database: String,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Number of attempts for the initial ping
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Maximum pool size
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
}

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Capacity of the relay queue between scanners and the writer
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long the writer waits for a line before rechecking completion
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Number of scan segments (defaults to available parallelism)
    #[serde(default)]
    pub segments: Option<usize>,

    /// Upper bound on concurrently running scans (defaults to available parallelism)
    #[serde(default)]
    pub max_parallel_scans: Option<usize>,

    /// Records fetched per round trip
    #[serde(default = "default_scan_batch_size")]
    pub scan_batch_size: u32,

    /// Records sampled for attribute discovery
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Size of the output buffer in bytes
    #[serde(default = "default_write_buffer_bytes")]
    pub write_buffer_bytes: usize,

    /// How the output file is opened
    #[serde(default)]
    pub open_mode: OpenMode,
}

/// Output file open mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// Create or truncate the file; every export starts fresh
    #[default]
    Truncate,

    /// Append to an existing file; the header is only written to an empty file
    Append,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "test".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_scan_batch_size() -> u32 {
    crate::export::source::mongo::DEFAULT_BATCH_SIZE
}

fn default_sample_size() -> usize {
    100
}

fn default_write_buffer_bytes() -> usize {
    crate::export::sink::DEFAULT_BUFFER_BYTES
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

/// Available parallelism of the host, or 1 when it cannot be determined
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            database: default_database(),
            timeout: default_timeout(),
            retry_attempts: default_retry_attempts(),
            max_pool_size: default_max_pool_size(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
            segments: None,
            max_parallel_scans: None,
            scan_batch_size: default_scan_batch_size(),
            sample_size: default_sample_size(),
            write_buffer_bytes: default_write_buffer_bytes(),
            open_mode: OpenMode::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// When `path` is `None` the default location is used. A missing file at
    /// the default location yields the default configuration; a missing file
    /// that was asked for explicitly is an error.
    ///
    /// # Arguments
    /// * `path` - Optional path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_config_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tabledump")
            .join("config.toml")
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        self.connection.validate_uri()?;
        self.export.validate()
    }

    /// Get connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.timeout)
    }
}

impl ConnectionConfig {
    /// Check that the connection URI has a MongoDB scheme
    ///
    /// # Returns
    /// * `Result<()>` - Ok if URI is valid, error otherwise
    pub fn validate_uri(&self) -> Result<()> {
        if self.uri.starts_with("mongodb://") || self.uri.starts_with("mongodb+srv://") {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                field: "connection.uri".to_string(),
                value: self.uri.clone(),
            }
            .into())
        }
    }
}

impl ExportConfig {
    /// Reject values that would stall or misconfigure the pipeline
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, usize); 4] = [
            ("export.queue_capacity", self.queue_capacity),
            ("export.poll_interval_ms", self.poll_interval_ms as usize),
            ("export.scan_batch_size", self.scan_batch_size as usize),
            ("export.sample_size", self.sample_size),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(invalid(field, value));
            }
        }

        if let Some(0) = self.segments {
            return Err(invalid("export.segments", 0));
        }
        if let Some(0) = self.max_parallel_scans {
            return Err(invalid("export.max_parallel_scans", 0));
        }

        Ok(())
    }

    /// Number of segments to request from the row source
    pub fn segment_count(&self) -> usize {
        self.segments.unwrap_or_else(available_parallelism)
    }

    /// Maximum number of scans running at once
    pub fn parallelism(&self) -> usize {
        self.max_parallel_scans.unwrap_or_else(available_parallelism)
    }

    /// Writer poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn invalid(field: &str, value: usize) -> crate::error::TableDumpError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.uri, "mongodb://localhost:27017");
        assert_eq!(config.connection.database, "test");
        assert_eq!(config.export.queue_capacity, 10_000);
        assert_eq!(config.export.open_mode, OpenMode::Truncate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_timeout() {
        let config = Config::default();
        assert_eq!(config.connection_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [export]
            queue_capacity = 2
            open_mode = "append"
            segments = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.export.queue_capacity, 2);
        assert_eq!(config.export.open_mode, OpenMode::Append);
        assert_eq!(config.export.segment_count(), 16);
        assert_eq!(config.export.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.connection.uri, "mongodb://localhost:27017");
    }

    #[test]
    fn test_invalid_toml_is_format_error() {
        let err = Config::from_toml_str("[export\nqueue_capacity = ").unwrap_err();
        assert!(err.to_string().contains("Invalid config format"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.export.queue_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("export.queue_capacity"));
    }

    #[test]
    fn test_validate_rejects_zero_segments() {
        let mut config = Config::default();
        config.export.segments = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_uri() {
        let mut config = Config::default();
        config.connection.uri = "postgres://localhost".to_string();
        assert!(config.validate().is_err());

        config.connection.uri = "mongodb+srv://cluster.example.net".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load_from_file(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.connection.database = "inventory".to_string();
        config.export.max_parallel_scans = Some(3);
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(loaded.connection.database, "inventory");
        assert_eq!(loaded.export.parallelism(), 3);
    }

    #[test]
    fn test_defaults_follow_available_parallelism() {
        let config = ExportConfig::default();
        assert_eq!(config.segment_count(), available_parallelism());
        assert!(config.parallelism() >= 1);
    }
}
