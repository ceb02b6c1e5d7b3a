//! Configuration system tests.

use nodemetrics::core::config::LogLevel;
use nodemetrics::core::{Config, ConfigBuilder};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.metrics.max_metrics, 50);
    assert_eq!(config.metrics.save_interval, Duration::from_secs(60));
    assert!(config.metrics.register_system_metrics);
    assert_eq!(config.storage.catalog_file, "metrics_config.json");
    assert_eq!(config.storage.snapshot_file, "boot_metrics.bin");
    assert!(config.storage.format_on_mount_failure);
}

#[test]
fn test_config_builder() {
    let config = ConfigBuilder::new()
        .data_dir(PathBuf::from("/tmp/node-7"))
        .max_metrics(12)
        .save_interval(Duration::from_secs(5))
        .register_system_metrics(false)
        .max_log_bytes(4096)
        .log_level(LogLevel::Debug)
        .build()
        .unwrap();

    assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/node-7"));
    assert_eq!(config.metrics.max_metrics, 12);
    assert_eq!(config.metrics.save_interval.as_secs(), 5);
    assert!(!config.metrics.register_system_metrics);
    assert_eq!(config.storage.max_log_bytes, 4096);
    assert_eq!(config.logging.level, LogLevel::Debug);
}

#[test]
fn test_yaml_config() {
    let yaml = r#"
storage:
  data_dir: /data/metrics
  max_log_bytes: 65536
  format_on_mount_failure: false
metrics:
  max_metrics: 20
  save_interval: 2m
logging:
  level: warn
"#;

    let config = ConfigBuilder::new()
        .from_yaml(yaml)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.storage.data_dir, PathBuf::from("/data/metrics"));
    assert_eq!(config.storage.max_log_bytes, 65536);
    assert!(!config.storage.format_on_mount_failure);
    assert_eq!(config.metrics.max_metrics, 20);
    assert_eq!(config.metrics.save_interval.as_secs(), 120);
    assert_eq!(config.logging.level, LogLevel::Warn);
    // Unspecified fields keep their defaults
    assert_eq!(config.storage.log_file, "metrics.log");
    assert!(config.metrics.register_system_metrics);
}

#[test]
fn test_config_validation() {
    // Valid config should pass
    let valid_config = Config::default();
    assert!(valid_config.validate().is_ok());

    // Empty catalog
    let invalid_config = ConfigBuilder::new().max_metrics(0).build();
    assert!(invalid_config.is_err());

    // Log too small to hold a record
    let invalid_config = ConfigBuilder::new().max_log_bytes(16).build();
    assert!(invalid_config.is_err());

    // Snapshot would overwrite the catalog
    let mut config = Config::default();
    config.storage.snapshot_file = config.storage.catalog_file.clone();
    assert!(config.validate().is_err());
}

#[test]
fn test_error_handling() {
    // Invalid YAML
    let result = ConfigBuilder::new().from_yaml("invalid: yaml: content: [");
    assert!(result.is_err());

    // Invalid field values
    let result = ConfigBuilder::new().from_yaml(
        r#"
metrics:
  max_metrics: "not_a_number"
"#,
    );
    assert!(result.is_err());

    let result = ConfigBuilder::new().from_yaml(
        r#"
metrics:
  save_interval: soon
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_humantime_durations() {
    let yaml = r#"
metrics:
  save_interval: 1h 30m
"#;

    let config = ConfigBuilder::new()
        .from_yaml(yaml)
        .unwrap()
        .build()
        .unwrap();

    assert_eq!(config.metrics.save_interval.as_secs(), 90 * 60);
}
