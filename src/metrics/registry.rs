//! Metric catalog and boot snapshot, kept in lockstep.
//!
//! Every name in the catalog has exactly one boot snapshot entry of the same
//! kind and vice versa. All mutation goes through [`MetricRegistry`], which
//! is the only place that touches both maps.

use crate::core::{MetricsError, Result};
use crate::metrics::types::{
    is_valid_name, HistogramStats, MetricData, MetricInfo, MetricKind, MetricValue, MAX_NAME_LENGTH,
};
use std::collections::BTreeMap;

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Catalog entry written and boot value zeroed
    Registered,
    /// Existing entry of the same kind kept with its boot value
    Preserved,
    /// Catalog full and the name is new
    Rejected,
    /// Name empty or longer than [`MAX_NAME_LENGTH`]
    InvalidName,
}

/// Catalog of declared metrics plus their since-boot values.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    catalog: BTreeMap<String, MetricInfo>,
    boot: BTreeMap<String, MetricValue>,
    max_metrics: usize,
}

impl MetricRegistry {
    /// Create an empty registry holding at most `max_metrics` entries
    pub fn new(max_metrics: usize) -> Self {
        Self {
            catalog: BTreeMap::new(),
            boot: BTreeMap::new(),
            max_metrics,
        }
    }

    /// Rebuild a registry from decoded parts, checking lockstep and capacity
    pub fn from_parts(
        max_metrics: usize,
        catalog: BTreeMap<String, MetricInfo>,
        boot: BTreeMap<String, MetricValue>,
    ) -> Result<Self> {
        Self::check_catalog(max_metrics, &catalog)?;

        for (name, info) in &catalog {
            match boot.get(name) {
                Some(value) if value.kind() == info.kind => {},
                Some(value) => {
                    return Err(MetricsError::corrupt(format!(
                        "metric '{}' declared {} but stored as {}",
                        name,
                        info.kind.as_str(),
                        value.kind().as_str()
                    )));
                },
                None => {
                    return Err(MetricsError::corrupt(format!(
                        "metric '{}' has no boot value",
                        name
                    )));
                },
            }
        }

        if let Some(orphan) = boot.keys().find(|name| !catalog.contains_key(*name)) {
            return Err(MetricsError::corrupt(format!(
                "boot value '{}' has no catalog entry",
                orphan
            )));
        }

        Ok(Self {
            catalog,
            boot,
            max_metrics,
        })
    }

    /// Registry for a persisted catalog whose boot values were lost; every
    /// entry starts at zero stamped `now`.
    pub fn from_catalog(
        max_metrics: usize,
        catalog: BTreeMap<String, MetricInfo>,
        now: u64,
    ) -> Result<Self> {
        Self::check_catalog(max_metrics, &catalog)?;

        let boot = catalog
            .values()
            .map(|info| (info.name.clone(), MetricValue::zero(info.kind, now)))
            .collect();
        Ok(Self {
            catalog,
            boot,
            max_metrics,
        })
    }

    fn check_catalog(max_metrics: usize, catalog: &BTreeMap<String, MetricInfo>) -> Result<()> {
        if catalog.len() > max_metrics {
            return Err(MetricsError::corrupt(format!(
                "catalog holds {} metrics, limit is {}",
                catalog.len(),
                max_metrics
            )));
        }

        for (name, info) in catalog {
            if info.name != *name {
                return Err(MetricsError::corrupt(format!(
                    "catalog key '{}' names metric '{}'",
                    name, info.name
                )));
            }
            if !is_valid_name(name) {
                return Err(MetricsError::corrupt(format!(
                    "catalog name '{}' is not 1..={} bytes",
                    name, MAX_NAME_LENGTH
                )));
            }
        }
        Ok(())
    }

    /// Insert or overwrite a catalog entry and zero its boot value.
    ///
    /// A new name is rejected once the catalog is full; an existing name is
    /// always overwritten.
    pub fn register(&mut self, info: MetricInfo, now: u64) -> RegisterOutcome {
        if !is_valid_name(&info.name) {
            return RegisterOutcome::InvalidName;
        }
        if !self.catalog.contains_key(&info.name) && self.catalog.len() >= self.max_metrics {
            return RegisterOutcome::Rejected;
        }

        self.boot
            .insert(info.name.clone(), MetricValue::zero(info.kind, now));
        self.catalog.insert(info.name.clone(), info);
        RegisterOutcome::Registered
    }

    /// Register unless an entry of the same kind already exists.
    ///
    /// An existing entry keeps its boot value; only its metadata is refreshed.
    pub fn register_if_absent(&mut self, info: MetricInfo, now: u64) -> RegisterOutcome {
        match self.catalog.get_mut(&info.name) {
            Some(existing) if existing.kind == info.kind => {
                *existing = info;
                RegisterOutcome::Preserved
            },
            _ => self.register(info, now),
        }
    }

    /// Add `delta` to a counter. Returns the sample to log, or `None` if the
    /// name is unknown or not a counter.
    pub fn increment(&mut self, name: &str, delta: i64, now: u64) -> Option<MetricValue> {
        let entry = self.boot_entry(name, MetricKind::Counter)?;
        if let MetricData::Counter(total) = &mut entry.data {
            *total = total.saturating_add(delta);
        }
        entry.timestamp = now;
        Some(MetricValue::new(now, MetricData::Counter(delta)))
    }

    /// Overwrite a gauge. Returns the sample to log, or `None` if rejected.
    pub fn set_gauge(&mut self, name: &str, value: f64, now: u64) -> Option<MetricValue> {
        let entry = self.boot_entry(name, MetricKind::Gauge)?;
        entry.data = MetricData::Gauge(value);
        entry.timestamp = now;
        Some(MetricValue::new(now, MetricData::Gauge(value)))
    }

    /// Record one histogram observation. Returns the single-point sample to
    /// log, or `None` if rejected.
    pub fn record(&mut self, name: &str, value: f64, now: u64) -> Option<MetricValue> {
        let entry = self.boot_entry(name, MetricKind::Histogram)?;
        if let MetricData::Histogram(stats) = &mut entry.data {
            stats.record(value);
        }
        entry.timestamp = now;
        Some(MetricValue::new(now, MetricData::Histogram(HistogramStats::single(value))))
    }

    /// Zero every boot value for the current catalog.
    pub fn reset(&mut self, now: u64) {
        self.boot = self
            .catalog
            .values()
            .map(|info| (info.name.clone(), MetricValue::zero(info.kind, now)))
            .collect();
    }

    /// Catalog entry for `name`.
    pub fn info(&self, name: &str) -> Option<&MetricInfo> {
        self.catalog.get(name)
    }

    /// Since-boot value for `name`.
    pub fn boot_value(&self, name: &str) -> Option<&MetricValue> {
        self.boot.get(name)
    }

    /// All catalog entries by name.
    pub fn catalog(&self) -> &BTreeMap<String, MetricInfo> {
        &self.catalog
    }

    /// All since-boot values by name.
    pub fn boot(&self) -> &BTreeMap<String, MetricValue> {
        &self.boot
    }

    /// Catalog entries, optionally restricted to one category
    pub fn filtered(&self, category: Option<&str>) -> BTreeMap<String, MetricInfo> {
        self.catalog
            .iter()
            .filter(|(_, info)| category.map_or(true, |c| info.category == c))
            .map(|(name, info)| (name.clone(), info.clone()))
            .collect()
    }

    /// Catalog capacity.
    pub fn max_metrics(&self) -> usize {
        self.max_metrics
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    fn boot_entry(&mut self, name: &str, kind: MetricKind) -> Option<&mut MetricValue> {
        match self.catalog.get(name) {
            Some(info) if info.kind == kind => self.boot.get_mut(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(name: &str) -> MetricInfo {
        MetricInfo::new(name, MetricKind::Counter, "test counter")
    }

    #[test]
    fn test_register_creates_zeroed_boot_value() {
        let mut registry = MetricRegistry::new(4);
        let outcome =
            registry.register(MetricInfo::new("h", MetricKind::Histogram, "latency"), 42);

        assert_eq!(outcome, RegisterOutcome::Registered);
        let value = registry.boot_value("h").unwrap();
        assert_eq!(value.timestamp, 42);
        assert_eq!(value.as_histogram(), Some(&HistogramStats::default()));
    }

    #[test]
    fn test_capacity_rejects_new_names_only() {
        let mut registry = MetricRegistry::new(2);
        registry.register(counter("a"), 0);
        registry.register(counter("b"), 0);

        assert_eq!(registry.register(counter("c"), 0), RegisterOutcome::Rejected);
        assert!(registry.info("c").is_none());
        assert!(registry.boot_value("c").is_none());

        registry.increment("a", 5, 1);
        assert_eq!(
            registry.register(MetricInfo::new("a", MetricKind::Gauge, "now a gauge"), 2),
            RegisterOutcome::Registered
        );
        assert_eq!(registry.boot_value("a").unwrap().as_gauge(), Some(0.0));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_if_absent_preserves_value() {
        let mut registry = MetricRegistry::new(4);
        registry.register(counter("requests"), 0);
        registry.increment("requests", 9, 10);

        let outcome = registry
            .register_if_absent(MetricInfo::new("requests", MetricKind::Counter, "renamed"), 20);
        assert_eq!(outcome, RegisterOutcome::Preserved);
        assert_eq!(registry.boot_value("requests").unwrap().as_counter(), Some(9));
        assert_eq!(registry.info("requests").unwrap().description, "renamed");

        let outcome = registry
            .register_if_absent(MetricInfo::new("requests", MetricKind::Gauge, "kind change"), 30);
        assert_eq!(outcome, RegisterOutcome::Registered);
        assert_eq!(registry.boot_value("requests").unwrap().as_gauge(), Some(0.0));
    }

    #[test]
    fn test_updates_rejected_on_kind_mismatch() {
        let mut registry = MetricRegistry::new(4);
        registry.register(counter("c"), 0);

        assert!(registry.set_gauge("c", 1.0, 1).is_none());
        assert!(registry.record("c", 1.0, 1).is_none());
        assert!(registry.increment("missing", 1, 1).is_none());
        assert_eq!(registry.boot_value("c").unwrap().as_counter(), Some(0));
    }

    #[test]
    fn test_counter_sample_carries_delta() {
        let mut registry = MetricRegistry::new(4);
        registry.register(counter("x"), 0);

        registry.increment("x", 3, 1);
        let sample = registry.increment("x", -1, 2).unwrap();

        assert_eq!(sample.as_counter(), Some(-1));
        assert_eq!(sample.timestamp, 2);
        assert_eq!(registry.boot_value("x").unwrap().as_counter(), Some(2));
    }

    #[test]
    fn test_histogram_accumulates_since_boot() {
        let mut registry = MetricRegistry::new(4);
        registry.register(MetricInfo::new("h", MetricKind::Histogram, ""), 0);

        registry.record("h", 2.0, 1);
        let sample = registry.record("h", 8.0, 2).unwrap();

        assert_eq!(sample.as_histogram(), Some(&HistogramStats::single(8.0)));
        let stats = registry.boot_value("h").unwrap().as_histogram().copied().unwrap();
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 8.0);
        assert_eq!(stats.sum, 10.0);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.value, 5.0);
    }

    #[test]
    fn test_reset_zeroes_all_entries() {
        let mut registry = MetricRegistry::new(4);
        registry.register(counter("c"), 0);
        registry.register(MetricInfo::new("g", MetricKind::Gauge, ""), 0);
        registry.increment("c", 4, 1);
        registry.set_gauge("g", 3.5, 1);

        registry.reset(99);

        assert_eq!(registry.boot_value("c"), Some(&MetricValue::zero(MetricKind::Counter, 99)));
        assert_eq!(registry.boot_value("g"), Some(&MetricValue::zero(MetricKind::Gauge, 99)));
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_maps() {
        let mut catalog = BTreeMap::new();
        catalog.insert("a".to_string(), counter("a"));

        let mut boot = BTreeMap::new();
        boot.insert("a".to_string(), MetricValue::zero(MetricKind::Gauge, 0));
        assert!(MetricRegistry::from_parts(4, catalog.clone(), boot).is_err());

        assert!(MetricRegistry::from_parts(4, catalog.clone(), BTreeMap::new()).is_err());

        let mut boot = BTreeMap::new();
        boot.insert("a".to_string(), MetricValue::zero(MetricKind::Counter, 0));
        boot.insert("b".to_string(), MetricValue::zero(MetricKind::Counter, 0));
        assert!(MetricRegistry::from_parts(4, catalog.clone(), boot.clone()).is_err());

        boot.remove("b");
        assert!(MetricRegistry::from_parts(0, catalog.clone(), boot.clone()).is_err());
        assert!(MetricRegistry::from_parts(4, catalog, boot).is_ok());
    }

    #[test]
    fn test_register_rejects_unloggable_names() {
        let mut registry = MetricRegistry::new(4);
        let long = "n".repeat(MAX_NAME_LENGTH + 1);

        assert_eq!(registry.register(counter(&long), 0), RegisterOutcome::InvalidName);
        assert_eq!(registry.register(counter(""), 0), RegisterOutcome::InvalidName);
        assert!(registry.is_empty());

        let longest = "n".repeat(MAX_NAME_LENGTH);
        assert_eq!(registry.register(counter(&longest), 0), RegisterOutcome::Registered);
    }

    #[test]
    fn test_from_catalog_zeroes_every_entry() {
        let mut catalog = BTreeMap::new();
        catalog.insert("c".to_string(), counter("c"));
        catalog.insert("h".to_string(), MetricInfo::new("h", MetricKind::Histogram, ""));

        let registry = MetricRegistry::from_catalog(4, catalog.clone(), 77).unwrap();

        assert_eq!(registry.catalog(), &catalog);
        assert_eq!(registry.boot_value("c"), Some(&MetricValue::zero(MetricKind::Counter, 77)));
        assert_eq!(registry.boot_value("h"), Some(&MetricValue::zero(MetricKind::Histogram, 77)));
        assert!(MetricRegistry::from_catalog(1, catalog, 0).is_err());
    }

    #[test]
    fn test_filtered_by_category() {
        let mut registry = MetricRegistry::new(4);
        registry.register(counter("a").with_category("net"), 0);
        registry.register(counter("b").with_category("power"), 0);
        registry.register(counter("c"), 0);

        let net = registry.filtered(Some("net"));
        assert_eq!(net.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(registry.filtered(None).len(), 3);
    }
}
