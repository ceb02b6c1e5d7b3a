//! Scope timer that records elapsed time into a histogram.

use crate::system::MetricsSystem;

/// Records the time between creation and drop, in milliseconds on the
/// system's clock, into a histogram metric. Obtained from
/// [`MetricsSystem::timer`].
#[must_use = "the timer records when dropped; binding it to `_` drops it immediately"]
pub struct MetricTimer<'a> {
    system: &'a MetricsSystem,
    name: String,
    start_ms: u64,
}

impl<'a> MetricTimer<'a> {
    pub(crate) fn new(system: &'a MetricsSystem, name: impl Into<String>) -> Self {
        Self {
            system,
            name: name.into(),
            start_ms: system.now_ms(),
        }
    }

    /// Metric the duration will be recorded into
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MetricTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.system.now_ms().saturating_sub(self.start_ms);
        self.system.record_histogram(&self.name, elapsed_ms as f64);
    }
}
