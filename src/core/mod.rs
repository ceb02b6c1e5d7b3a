//! Core plumbing shared by every layer: errors, configuration, time and logging.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Config, ConfigBuilder, LogLevel, LoggingConfig, MetricsConfig, StorageConfig};
pub use error::{MetricsError, Result};
