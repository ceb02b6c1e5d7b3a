//! Configuration management for nodemetrics.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Validation and defaults

use crate::core::{MetricsError, Result};
use crate::storage::log::MAX_RECORD_LEN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Smallest log cap: two of the largest records, so rotation to half the
/// cap still fits the newest sample.
pub const MIN_LOG_BYTES: u64 = 2 * MAX_RECORD_LEN as u64;

/// Complete configuration for the metrics system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persistence configuration
    pub storage: StorageConfig,
    /// Metric catalog and flush configuration
    pub metrics: MetricsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the metrics volume
    pub data_dir: PathBuf,
    /// Catalog document file name, relative to the volume root
    pub catalog_file: String,
    /// Boot snapshot block file name, relative to the volume root
    pub snapshot_file: String,
    /// Time-series log file name, relative to the volume root
    pub log_file: String,
    /// Format the volume when it cannot be mounted
    pub format_on_mount_failure: bool,
    /// Log size that triggers rotation
    pub max_log_bytes: u64,
}

/// Metric catalog and flush configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Maximum number of registered metrics
    pub max_metrics: usize,
    /// Minimum time between periodic boot snapshot saves
    #[serde(with = "humantime_serde")]
    pub save_interval: Duration,
    /// Register the built-in `system.*` metrics on begin
    pub register_system_metrics: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets and line numbers in log lines
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-sample tracing
    Trace,
    /// Rejected updates and saves
    Debug,
    /// Lifecycle transitions
    Info,
    /// Recoverable failures
    Warn,
    /// Persistence failures
    Error,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: PathBuf::from("./nodemetrics_data"),
            catalog_file: "metrics_config.json".to_string(),
            snapshot_file: "boot_metrics.bin".to_string(),
            log_file: "metrics.log".to_string(),
            format_on_mount_failure: true,
            max_log_bytes: 1024 * 1024, // 1MB
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            max_metrics: 50,
            save_interval: Duration::from_secs(60),
            register_system_metrics: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.metrics.max_metrics == 0 {
            return Err(MetricsError::config("max_metrics must be greater than 0"));
        }

        if self.metrics.save_interval.is_zero() {
            return Err(MetricsError::config("save_interval must be greater than 0"));
        }

        let files = [
            ("catalog_file", &self.storage.catalog_file),
            ("snapshot_file", &self.storage.snapshot_file),
            ("log_file", &self.storage.log_file),
        ];
        for (field, name) in files {
            if name.trim().is_empty() {
                return Err(MetricsError::config(format!("{} must not be empty", field)));
            }
        }

        if self.storage.catalog_file == self.storage.snapshot_file
            || self.storage.catalog_file == self.storage.log_file
            || self.storage.snapshot_file == self.storage.log_file
        {
            return Err(MetricsError::config(
                "catalog_file, snapshot_file and log_file must be distinct",
            ));
        }

        if self.storage.max_log_bytes < MIN_LOG_BYTES {
            return Err(MetricsError::config(format!(
                "max_log_bytes must be at least {}, got {}",
                MIN_LOG_BYTES, self.storage.max_log_bytes
            )));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MetricsError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set data directory
    pub fn data_dir(mut self, path: PathBuf) -> Self {
        self.config.storage.data_dir = path;
        self
    }

    /// Set the maximum number of registered metrics
    pub fn max_metrics(mut self, count: usize) -> Self {
        self.config.metrics.max_metrics = count;
        self
    }

    /// Set the periodic save interval
    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.config.metrics.save_interval = interval;
        self
    }

    /// Enable or disable the built-in system metrics
    pub fn register_system_metrics(mut self, enable: bool) -> Self {
        self.config.metrics.register_system_metrics = enable;
        self
    }

    /// Set the log rotation threshold
    pub fn max_log_bytes(mut self, bytes: u64) -> Self {
        self.config.storage.max_log_bytes = bytes;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
