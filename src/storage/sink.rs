//! Time-series sink seam.
//!
//! The sink is an append-only log of timestamped samples keyed by metric
//! name. Sample payloads are opaque bytes to the sink; the metrics system
//! encodes and decodes them.

use crate::core::Result;
use std::collections::VecDeque;

pub use crate::metrics::types::MAX_NAME_LENGTH;

/// Largest sample payload a sink must accept.
pub const MAX_DATA_LENGTH: usize = 128;

/// One retained sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRecord {
    /// Milliseconds since boot when the sample was taken
    pub timestamp: u64,
    /// Metric the sample belongs to
    pub name: String,
    /// Encoded sample, opaque to the sink
    pub data: Vec<u8>,
}

/// Durable append-only store of metric samples.
pub trait TimeSeriesSink: Send {
    /// Prepare the sink for use. Idempotent.
    fn begin(&mut self) -> Result<()>;

    /// Release the sink. Further appends fail until `begin` is called again.
    fn end(&mut self);

    /// Append one sample.
    fn log_metric(&mut self, name: &str, timestamp: u64, data: &[u8]) -> Result<()>;

    /// Samples for `name` with `timestamp >= since`, in append order.
    /// An empty `name` matches every metric.
    fn query_metrics(&self, name: &str, since: u64) -> Result<Vec<SinkRecord>>;

    /// Number of retained samples across all metrics.
    fn record_count(&self) -> Result<usize>;

    /// Drop every retained sample.
    fn clear(&mut self) -> Result<()>;
}

/// Bounded in-memory sink. The oldest sample is dropped once full.
#[derive(Debug)]
pub struct MemorySink {
    records: VecDeque<SinkRecord>,
    capacity: usize,
    active: bool,
}

impl MemorySink {
    /// Sink retaining at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            active: false,
        }
    }

    /// Whether `begin` has been called without a matching `end`.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(16 * 1024)
    }
}

impl TimeSeriesSink for MemorySink {
    fn begin(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn end(&mut self) {
        self.active = false;
    }

    fn log_metric(&mut self, name: &str, timestamp: u64, data: &[u8]) -> Result<()> {
        validate_record(self.active, name, data)?;

        if self.capacity == 0 {
            return Ok(());
        }
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(SinkRecord {
            timestamp,
            name: name.to_string(),
            data: data.to_vec(),
        });
        Ok(())
    }

    fn query_metrics(&self, name: &str, since: u64) -> Result<Vec<SinkRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.matches(name, since))
            .cloned()
            .collect())
    }

    fn record_count(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.records.clear();
        Ok(())
    }
}

impl SinkRecord {
    /// Query filter shared by every sink.
    pub fn matches(&self, name: &str, since: u64) -> bool {
        self.timestamp >= since && (name.is_empty() || self.name == name)
    }
}

/// Append precondition shared by every sink.
pub(crate) fn validate_record(active: bool, name: &str, data: &[u8]) -> Result<()> {
    use crate::core::MetricsError;

    if !active {
        return Err(MetricsError::NotInitialized);
    }
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return Err(MetricsError::storage(format!(
            "metric name length {} outside 1..={}",
            name.len(),
            MAX_NAME_LENGTH
        )));
    }
    if data.len() > MAX_DATA_LENGTH {
        return Err(MetricsError::storage(format!(
            "sample of {} bytes exceeds {}",
            data.len(),
            MAX_DATA_LENGTH
        )));
    }
    Ok(())
}
