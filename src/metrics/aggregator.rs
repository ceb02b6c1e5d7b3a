//! Recomputes a reportable value from raw time-series samples.
//!
//! The sink is the authoritative event log: counters hold per-update deltas,
//! gauges hold each written value and histograms hold single observations.
//! Aggregation starts from scratch on every query and never consults the
//! boot snapshot.

use crate::metrics::types::{HistogramStats, MetricData, MetricKind, MetricValue};

/// Fold `samples` (in append order) of a metric of `kind` into one value.
///
/// Samples whose payload does not match `kind` are skipped. When nothing
/// usable remains the result is the zero value of `kind` stamped `now`.
pub fn aggregate(kind: MetricKind, samples: &[MetricValue], now: u64) -> MetricValue {
    match kind {
        MetricKind::Counter => {
            let total = samples
                .iter()
                .filter_map(MetricValue::as_counter)
                .fold(0i64, i64::saturating_add);
            MetricValue::new(now, MetricData::Counter(total))
        },
        MetricKind::Gauge => samples
            .iter()
            .rev()
            .find(|sample| sample.kind() == MetricKind::Gauge)
            .copied()
            .unwrap_or_else(|| MetricValue::zero(MetricKind::Gauge, now)),
        MetricKind::Histogram => {
            let stats = combine_histograms(samples.iter().filter_map(MetricValue::as_histogram));
            MetricValue::new(now, MetricData::Histogram(stats))
        },
    }
}

/// Merge histogram accumulators in order.
///
/// For single-point samples this is min/max/sum over the raw observations,
/// count = number of samples and value = sum / count.
pub fn combine_histograms<'a>(samples: impl IntoIterator<Item = &'a HistogramStats>) -> HistogramStats {
    samples
        .into_iter()
        .fold(HistogramStats::default(), |mut acc, sample| {
            acc.merge(sample);
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(ts: u64, delta: i64) -> MetricValue {
        MetricValue::new(ts, MetricData::Counter(delta))
    }

    fn gauge(ts: u64, value: f64) -> MetricValue {
        MetricValue::new(ts, MetricData::Gauge(value))
    }

    fn point(ts: u64, value: f64) -> MetricValue {
        MetricValue::new(ts, MetricData::Histogram(HistogramStats::single(value)))
    }

    #[test]
    fn test_counter_sums_deltas() {
        let samples = [counter(1, 3), counter(2, -1), counter(3, 5)];
        let result = aggregate(MetricKind::Counter, &samples, 10);

        assert_eq!(result.as_counter(), Some(7));
        assert_eq!(result.timestamp, 10);
    }

    #[test]
    fn test_gauge_returns_last_sample() {
        let samples = [gauge(1, 1.5), gauge(2, -4.0), gauge(3, 12.25)];
        let result = aggregate(MetricKind::Gauge, &samples, 10);

        assert_eq!(result, gauge(3, 12.25));
    }

    #[test]
    fn test_histogram_folds_raw_points() {
        let samples = [point(1, 2.0), point(2, 8.0), point(3, 5.0)];
        let result = aggregate(MetricKind::Histogram, &samples, 10);
        let stats = result.as_histogram().unwrap();

        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.sum, 15.0);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.value, 5.0);
    }

    #[test]
    fn test_histogram_mean_is_not_mean_of_means() {
        let mut pair = HistogramStats::single(1.0);
        pair.record(3.0);
        let samples = [
            MetricValue::new(1, MetricData::Histogram(pair)),
            point(2, 8.0),
        ];
        let stats = *aggregate(MetricKind::Histogram, &samples, 5).as_histogram().unwrap();

        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum, 12.0);
        assert_eq!(stats.value, 4.0);
    }

    #[test]
    fn test_mismatched_samples_are_skipped() {
        let samples = [counter(1, 4), gauge(2, 9.0), counter(3, 1)];

        assert_eq!(aggregate(MetricKind::Counter, &samples, 5).as_counter(), Some(5));
        assert_eq!(
            aggregate(MetricKind::Histogram, &samples, 5),
            MetricValue::zero(MetricKind::Histogram, 5)
        );
    }

    #[test]
    fn test_empty_input_yields_zero() {
        assert_eq!(aggregate(MetricKind::Gauge, &[], 7), MetricValue::zero(MetricKind::Gauge, 7));
        assert_eq!(aggregate(MetricKind::Counter, &[], 7).as_counter(), Some(0));
    }
}
