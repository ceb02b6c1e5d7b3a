//! Metric data model, catalog and aggregation.
//!
//! - `types`: metric kinds, catalog entries and type-tagged values
//! - `registry`: catalog plus since-boot snapshot, updated in lockstep
//! - `aggregator`: recomputes a value from raw time-series samples
//! - `builtin`: the `system.*` metrics every node exposes
//! - `timer`: scope guard recording durations into a histogram

pub mod aggregator;
pub mod builtin;
pub mod registry;
pub mod timer;
pub mod types;

pub use aggregator::{aggregate, combine_histograms};
pub use registry::{MetricRegistry, RegisterOutcome};
pub use timer::MetricTimer;
pub use types::{HistogramStats, MetricData, MetricInfo, MetricKind, MetricValue};
