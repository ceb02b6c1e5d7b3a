//! Built-in `system.*` metrics registered on every boot.

use crate::metrics::types::{MetricInfo, MetricKind};

/// Requests handled since first boot.
pub const REQUESTS_TOTAL: &str = "system.requests.total";
/// Requests that failed.
pub const REQUESTS_ERRORS: &str = "system.requests.errors";
/// Requests that timed out.
pub const REQUESTS_TIMEOUTS: &str = "system.requests.timeouts";
/// Request duration histogram, in milliseconds.
pub const REQUESTS_DURATION: &str = "system.requests.duration";
/// Free heap bytes.
pub const HEAP_FREE: &str = "system.heap.free";
/// Lowest free heap bytes seen.
pub const HEAP_MIN: &str = "system.heap.min";
/// Wireless signal strength, in dBm.
pub const SIGNAL_STRENGTH: &str = "system.wifi.signal";
/// Milliseconds since the clock started.
pub const UPTIME: &str = "system.uptime";

/// Category shared by every built-in metric.
pub const CATEGORY: &str = "system";

static DEFINITIONS: [(&str, MetricKind, &str, &str); 8] = [
    (REQUESTS_TOTAL, MetricKind::Counter, "Total handled requests", ""),
    (REQUESTS_ERRORS, MetricKind::Counter, "Request errors", ""),
    (REQUESTS_TIMEOUTS, MetricKind::Counter, "Request timeouts", ""),
    (REQUESTS_DURATION, MetricKind::Histogram, "Request handling duration", "ms"),
    (HEAP_FREE, MetricKind::Gauge, "Free heap memory", "bytes"),
    (HEAP_MIN, MetricKind::Gauge, "Minimum free heap memory", "bytes"),
    (SIGNAL_STRENGTH, MetricKind::Gauge, "WiFi signal strength", "dBm"),
    (UPTIME, MetricKind::Gauge, "System uptime", "ms"),
];

/// Catalog entries for the built-in metrics.
pub fn definitions() -> impl Iterator<Item = MetricInfo> {
    DEFINITIONS.iter().map(|(name, kind, description, unit)| {
        MetricInfo::new(*name, *kind, *description)
            .with_unit(*unit)
            .with_category(CATEGORY)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_names_are_unique() {
        let names: HashSet<String> = definitions().map(|info| info.name).collect();
        assert_eq!(names.len(), DEFINITIONS.len());
    }

    #[test]
    fn test_builtins_share_category() {
        assert!(definitions().all(|info| info.category == CATEGORY));
    }
}
