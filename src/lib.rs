//! Nodemetrics - on-device telemetry for long-running embedded nodes.
//!
//! Nodemetrics keeps a small catalog of named counters, gauges and
//! histograms, a since-boot snapshot that survives restarts, and an
//! append-only history of every update from which current values can be
//! recomputed.
//!
//! # Features
//!
//! - **Bounded Catalog**: At most `max_metrics` named metrics per node
//! - **Boot Snapshot**: Running totals persisted to flash and restored on start
//! - **Time-Series History**: Every update appended to a pluggable sink
//! - **Built-in Metrics**: Heap, signal strength and uptime gauges plus request counters
//! - **Single Lock**: All operations are linearizable, including flash I/O
//!
//! # Architecture
//!
//! - `core`: errors, configuration, clocks and logging setup
//! - `metrics`: data model, catalog registry and aggregation
//! - `storage`: volume access, on-flash formats and time-series sinks
//! - `monitoring`: host resource probes feeding the built-in gauges
//! - `system`: the [`MetricsSystem`] facade
//!
//! # Example
//!
//! ```no_run
//! use nodemetrics::core::Config;
//! use nodemetrics::MetricsSystem;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let metrics = MetricsSystem::new(Config::default())?;
//!     metrics.begin()?;
//!
//!     metrics.register_counter("app.jobs", "Jobs processed");
//!     metrics.increment_counter("app.jobs", 1);
//!     metrics.update_system_metrics();
//!
//!     let total = metrics.get_metric("app.jobs", true);
//!     println!("{:?}", total.as_counter());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod core;
pub mod metrics;
pub mod monitoring;
pub mod storage;
pub mod system;

// Re-export core types for convenience
pub use crate::core::{Config, MetricsError, Result};
pub use crate::metrics::{MetricInfo, MetricKind, MetricValue};
pub use crate::system::{MetricsSystem, MetricsSystemBuilder};
