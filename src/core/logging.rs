//! Tracing subscriber setup.

use crate::core::config::LoggingConfig;
use crate::core::{MetricsError, Result};

/// Environment variable that overrides the configured filter.
pub const LOG_ENV_VAR: &str = "NODEMETRICS_LOG";

/// Install the global tracing subscriber.
///
/// `NODEMETRICS_LOG` takes precedence over `config.level` and accepts any
/// `EnvFilter` directive. Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let fmt_layer = if config.structured {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .compact()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| MetricsError::config(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
