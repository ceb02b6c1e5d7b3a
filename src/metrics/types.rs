//! Metric data model.
//!
//! A metric is declared once with a [`MetricKind`] and carries a
//! [`MetricValue`] whose payload variant always matches that kind.

use serde::{Deserialize, Serialize};

/// Longest metric name, in bytes, that can be registered and logged.
pub const MAX_NAME_LENGTH: usize = 63;

/// Whether `name` can be registered.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LENGTH
}

/// The three metric kinds. Fixed for the lifetime of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    /// Signed running total (requests, errors)
    Counter,
    /// Last-write-wins measurement (heap, signal strength)
    Gauge,
    /// Min/max/sum/count/mean over recorded observations (durations)
    Histogram,
}

impl MetricKind {
    /// Integer tag used in the catalog document.
    pub fn as_tag(self) -> u8 {
        match self {
            MetricKind::Counter => 0,
            MetricKind::Gauge => 1,
            MetricKind::Histogram => 2,
        }
    }

    /// Inverse of [`MetricKind::as_tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MetricKind::Counter),
            1 => Some(MetricKind::Gauge),
            2 => Some(MetricKind::Histogram),
            _ => None,
        }
    }

    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Catalog entry describing a registered metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricInfo {
    /// Unique key, at most [`MAX_NAME_LENGTH`] bytes
    pub name: String,
    /// Kind fixed at registration
    pub kind: MetricKind,
    /// Free-form description
    pub description: String,
    /// Unit of measurement, empty when unspecified
    pub unit: String,
    /// Grouping category, empty when unspecified
    pub category: String,
}

impl MetricInfo {
    /// Entry without unit or category.
    pub fn new(name: impl Into<String>, kind: MetricKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            unit: String::new(),
            category: String::new(),
        }
    }

    /// Set the unit of measurement.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Set the grouping category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

/// Histogram accumulator.
///
/// With `count == 0` every field is zero. `value` is the arithmetic mean
/// `sum / count`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HistogramStats {
    /// Mean of the observations
    pub value: f64,
    /// Smallest observation
    pub min: f64,
    /// Largest observation
    pub max: f64,
    /// Sum of the observations
    pub sum: f64,
    /// Number of observations
    pub count: u32,
}

impl HistogramStats {
    /// Accumulator holding exactly one observation.
    pub fn single(value: f64) -> Self {
        Self {
            value,
            min: value,
            max: value,
            sum: value,
            count: 1,
        }
    }

    /// Fold one observation into the accumulator.
    pub fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count = self.count.saturating_add(1);
        self.value = self.sum / f64::from(self.count);
    }

    /// Fold another accumulator into this one.
    pub fn merge(&mut self, other: &HistogramStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.min = other.min;
            self.max = other.max;
        } else {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
        self.sum += other.sum;
        self.count = self.count.saturating_add(other.count);
        self.value = self.sum / f64::from(self.count);
    }
}

/// Type-tagged metric payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricData {
    /// Running total, or a delta in a sample
    Counter(i64),
    /// Last written value
    Gauge(f64),
    /// Accumulated observations
    Histogram(HistogramStats),
}

impl MetricData {
    /// Zero value for a kind.
    pub fn zero(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => MetricData::Counter(0),
            MetricKind::Gauge => MetricData::Gauge(0.0),
            MetricKind::Histogram => MetricData::Histogram(HistogramStats::default()),
        }
    }

    /// Kind matching the variant.
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricData::Counter(_) => MetricKind::Counter,
            MetricData::Gauge(_) => MetricKind::Gauge,
            MetricData::Histogram(_) => MetricKind::Histogram,
        }
    }
}

/// A timestamped metric payload.
///
/// Boot snapshot entries hold running state since boot. Samples written to
/// the time-series sink hold only the contribution of a single update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Milliseconds since boot
    pub timestamp: u64,
    /// Type-tagged payload
    pub data: MetricData,
}

impl Default for MetricValue {
    /// Result returned for unknown metrics: a zero counter at time zero.
    fn default() -> Self {
        Self {
            timestamp: 0,
            data: MetricData::Counter(0),
        }
    }
}

impl MetricValue {
    /// Value stamped at `timestamp`.
    pub fn new(timestamp: u64, data: MetricData) -> Self {
        Self { timestamp, data }
    }

    /// Zero value of `kind` stamped at `timestamp`.
    pub fn zero(kind: MetricKind, timestamp: u64) -> Self {
        Self::new(timestamp, MetricData::zero(kind))
    }

    /// Kind of the payload.
    pub fn kind(&self) -> MetricKind {
        self.data.kind()
    }

    /// Counter total, if this is a counter.
    pub fn as_counter(&self) -> Option<i64> {
        match self.data {
            MetricData::Counter(total) => Some(total),
            _ => None,
        }
    }

    /// Gauge reading, if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self.data {
            MetricData::Gauge(value) => Some(value),
            _ => None,
        }
    }

    /// Histogram accumulator, if this is a histogram.
    pub fn as_histogram(&self) -> Option<&HistogramStats> {
        match &self.data {
            MetricData::Histogram(stats) => Some(stats),
            _ => None,
        }
    }
}
