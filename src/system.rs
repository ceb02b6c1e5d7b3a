//! The metrics facade.
//!
//! [`MetricsSystem`] owns the catalog, the boot snapshot, the time-series
//! sink and the metrics volume behind a single mutex. Every public
//! operation holds that lock for its whole duration, including flash I/O
//! during saves and loads, so updates are linearizable with each other and
//! with persistence.
//!
//! Updates never fail from the caller's point of view: unknown names, kind
//! mismatches and sink errors are logged and otherwise ignored. Persistence
//! operations report failures through [`Result`].

use crate::core::{Clock, Config, MonotonicClock, Result};
use crate::metrics::aggregator::aggregate;
use crate::metrics::builtin;
use crate::metrics::registry::{MetricRegistry, RegisterOutcome};
use crate::metrics::timer::MetricTimer;
use crate::metrics::types::{MetricInfo, MetricKind, MetricValue, MAX_NAME_LENGTH};
use crate::monitoring::{NullProbe, SystemProbe};
use crate::storage::codec;
use crate::storage::{BootStore, DirFs, FileLog, Filesystem, TimeSeriesSink};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

/// Thread-safe entry point for declaring, updating and reading metrics.
pub struct MetricsSystem {
    state: Mutex<MetricsState>,
}

struct MetricsState {
    config: Config,
    registry: MetricRegistry,
    store: BootStore,
    fs: Box<dyn Filesystem>,
    sink: Box<dyn TimeSeriesSink>,
    clock: Box<dyn Clock>,
    probe: Box<dyn SystemProbe>,
    initialized: bool,
    last_save_ms: u64,
}

/// Assembles a [`MetricsSystem`] from its host collaborators.
///
/// Defaults: a [`DirFs`] volume at `storage.data_dir`, a [`FileLog`] sink on
/// that volume, a [`MonotonicClock`] and a [`NullProbe`].
pub struct MetricsSystemBuilder {
    config: Config,
    volume: Option<(Box<dyn Filesystem>, Box<dyn TimeSeriesSink>)>,
    sink: Option<Box<dyn TimeSeriesSink>>,
    clock: Option<Box<dyn Clock>>,
    probe: Option<Box<dyn SystemProbe>>,
}

impl MetricsSystemBuilder {
    /// Builder with default collaborators for `config`.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            volume: None,
            sink: None,
            clock: None,
            probe: None,
        }
    }

    /// Persist to `fs`. Unless [`sink`](Self::sink) is also set, samples go
    /// to a [`FileLog`] on the same volume.
    pub fn filesystem<F>(mut self, fs: F) -> Self
    where
        F: Filesystem + Clone + 'static,
    {
        let log = FileLog::new(
            fs.clone(),
            self.config.storage.log_file.clone(),
            self.config.storage.max_log_bytes,
        );
        self.volume = Some((Box::new(fs), Box::new(log)));
        self
    }

    /// Send samples to `sink` instead of the volume's log file.
    pub fn sink(mut self, sink: impl TimeSeriesSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Read time from `clock` instead of a [`MonotonicClock`].
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Read host resources from `probe` instead of a [`NullProbe`].
    pub fn probe(mut self, probe: impl SystemProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Validate the configuration and assemble the system.
    pub fn build(self) -> Result<MetricsSystem> {
        self.config.validate()?;

        let (fs, log) = match self.volume {
            Some(volume) => volume,
            None => {
                let dir = DirFs::new(self.config.storage.data_dir.clone());
                let log = FileLog::new(
                    dir.clone(),
                    self.config.storage.log_file.clone(),
                    self.config.storage.max_log_bytes,
                );
                (Box::new(dir) as Box<dyn Filesystem>, Box::new(log) as Box<dyn TimeSeriesSink>)
            },
        };

        let store = BootStore::new(
            self.config.storage.catalog_file.clone(),
            self.config.storage.snapshot_file.clone(),
        );

        let state = MetricsState {
            registry: MetricRegistry::new(self.config.metrics.max_metrics),
            store,
            fs,
            sink: self.sink.unwrap_or(log),
            clock: self.clock.unwrap_or_else(|| Box::new(MonotonicClock::new())),
            probe: self.probe.unwrap_or_else(|| Box::new(NullProbe)),
            initialized: false,
            last_save_ms: 0,
            config: self.config,
        };

        Ok(MetricsSystem {
            state: Mutex::new(state),
        })
    }
}

impl MetricsSystem {
    /// System with default host collaborators for `config`.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start assembling a system with custom collaborators.
    pub fn builder(config: Config) -> MetricsSystemBuilder {
        MetricsSystemBuilder::new(config)
    }

    /// Mount the volume, start the sink and restore the boot state.
    ///
    /// A missing or unreadable boot state is replaced by a zeroed snapshot,
    /// which is persisted immediately. The zeroed snapshot covers the
    /// persisted catalog if that document is still readable, otherwise the
    /// metrics registered so far. The built-in metrics are then registered,
    /// keeping any restored values. Reading a persisted catalog replaces
    /// metrics registered before `begin`.
    pub fn begin(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.initialized {
            return Ok(());
        }

        let format = state.config.storage.format_on_mount_failure;
        state.fs.mount(format).map_err(|e| {
            tracing::error!("Failed to mount metrics volume: {}", e);
            e
        })?;

        state.sink.begin().map_err(|e| {
            tracing::error!("Failed to start time-series sink: {}", e);
            e
        })?;

        match state.load() {
            Ok(()) => tracing::info!(metrics = state.registry.len(), "Restored boot metrics"),
            Err(e) => {
                tracing::warn!(category = e.category(), "Boot metrics unavailable ({}), resetting", e);
                state.restore_catalog();
                if let Err(e) = state.reset() {
                    tracing::error!("Failed to persist reset boot metrics: {}", e);
                }
            },
        }

        if state.config.metrics.register_system_metrics {
            state.register_builtins();
        }

        state.initialized = true;
        state.last_save_ms = state.clock.now_ms();
        Ok(())
    }

    /// Save the boot state one last time and stop the sink.
    pub fn end(&self) {
        let mut state = self.state.lock();
        if !state.initialized {
            return;
        }

        if let Err(e) = state.save() {
            tracing::error!("Final boot metrics save failed: {}", e);
        }
        state.sink.end();
        state.initialized = false;
        tracing::info!("Metrics system stopped");
    }

    /// Whether `begin` succeeded and `end` has not run since.
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Insert or overwrite a catalog entry and zero its boot value.
    ///
    /// Ignored with a warning when the catalog is full and the name is new,
    /// or when the name is empty or longer than [`MAX_NAME_LENGTH`] bytes.
    pub fn register(&self, info: MetricInfo) {
        self.state.lock().register(info);
    }

    /// Register a counter.
    pub fn register_counter(&self, name: &str, description: &str) {
        self.register(MetricInfo::new(name, MetricKind::Counter, description));
    }

    /// Register a gauge.
    pub fn register_gauge(&self, name: &str, description: &str) {
        self.register(MetricInfo::new(name, MetricKind::Gauge, description));
    }

    /// Register a histogram.
    pub fn register_histogram(&self, name: &str, description: &str) {
        self.register(MetricInfo::new(name, MetricKind::Histogram, description));
    }

    /// Add `delta` to a counter. The sink receives the delta, not the total.
    pub fn increment_counter(&self, name: &str, delta: i64) {
        self.state.lock().increment_counter(name, delta);
    }

    /// Overwrite a gauge.
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.state.lock().set_gauge(name, value);
    }

    /// Record one histogram observation.
    pub fn record_histogram(&self, name: &str, value: f64) {
        self.state.lock().record_histogram(name, value);
    }

    /// Current value of a metric.
    ///
    /// With `from_boot` the since-boot snapshot is returned as is. Otherwise
    /// the value is recomputed from all samples retained by the sink; with no
    /// samples the result is zero, stamped now. Unknown names yield
    /// [`MetricValue::default`].
    pub fn get_metric(&self, name: &str, from_boot: bool) -> MetricValue {
        let state = self.state.lock();
        let Some(kind) = state.registry.info(name).map(|info| info.kind) else {
            return MetricValue::default();
        };

        if from_boot {
            return state.registry.boot_value(name).copied().unwrap_or_default();
        }

        let samples = state.history(name, 0);
        aggregate(kind, &samples, state.clock.now_ms())
    }

    /// Raw samples for a metric, oldest first.
    ///
    /// `window` limits the result to samples taken within that span before
    /// now; `None` returns all retained history.
    pub fn get_metric_history(&self, name: &str, window: Option<Duration>) -> Vec<MetricValue> {
        let state = self.state.lock();
        if state.registry.info(name).is_none() {
            return Vec::new();
        }

        let since = window.map_or(0, |window| {
            let millis = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
            state.clock.now_ms().saturating_sub(millis)
        });
        state.history(name, since)
    }

    /// Registered metrics, optionally restricted to one category.
    pub fn metrics(&self, category: Option<&str>) -> BTreeMap<String, MetricInfo> {
        self.state.lock().registry.filtered(category)
    }

    /// Refresh the built-in gauges from the host and save the boot state if
    /// the save interval has elapsed. Meant to be polled by the caller.
    pub fn update_system_metrics(&self) {
        let mut state = self.state.lock();
        let now = state.clock.now_ms();

        if let Some(dbm) = state.probe.signal_strength() {
            state.set_gauge(builtin::SIGNAL_STRENGTH, f64::from(dbm));
        }
        let free = state.probe.free_heap();
        let min = state.probe.min_free_heap();
        state.set_gauge(builtin::HEAP_FREE, free as f64);
        state.set_gauge(builtin::HEAP_MIN, min as f64);
        state.set_gauge(builtin::UPTIME, now as f64);

        let interval = u64::try_from(state.config.metrics.save_interval.as_millis())
            .unwrap_or(u64::MAX);
        if state.initialized && now.saturating_sub(state.last_save_ms) >= interval {
            if let Err(e) = state.save() {
                tracing::error!("Periodic boot metrics save failed: {}", e);
            }
            state.last_save_ms = now;
        }
    }

    /// Zero every boot value and persist the result.
    pub fn reset_boot_metrics(&self) -> Result<()> {
        self.state.lock().reset()
    }

    /// Persist the catalog and boot snapshot.
    pub fn save_boot_metrics(&self) -> Result<()> {
        self.state.lock().save()
    }

    /// Replace the catalog and boot snapshot with the persisted ones.
    ///
    /// On failure the in-memory state is left untouched.
    pub fn load_boot_metrics(&self) -> Result<()> {
        self.state.lock().load()
    }

    /// Drop all retained samples, zero the boot snapshot and persist it.
    pub fn clear_history(&self) -> Result<()> {
        let mut state = self.state.lock();
        let cleared = state.sink.clear().map_err(|e| {
            tracing::error!("Failed to clear time-series sink: {}", e);
            e
        });
        let reset = state.reset();
        cleared.and(reset)
    }

    /// Milliseconds since boot on the system's clock.
    pub(crate) fn now_ms(&self) -> u64 {
        self.state.lock().clock.now_ms()
    }

    /// Start timing into the histogram `name`; recorded when the guard drops.
    pub fn timer(&self, name: &str) -> MetricTimer<'_> {
        MetricTimer::new(self, name)
    }
}

impl Drop for MetricsSystem {
    fn drop(&mut self) {
        self.end();
    }
}

impl MetricsState {
    fn register(&mut self, info: MetricInfo) {
        let now = self.clock.now_ms();
        let name = info.name.clone();
        match self.registry.register(info, now) {
            RegisterOutcome::Registered | RegisterOutcome::Preserved => {},
            RegisterOutcome::Rejected => tracing::warn!(
                metric = %name,
                limit = self.registry.max_metrics(),
                "Max metrics limit reached, ignoring registration"
            ),
            RegisterOutcome::InvalidName => tracing::warn!(
                metric = %name,
                limit = MAX_NAME_LENGTH,
                "Metric name must be 1 to {} bytes, ignoring registration",
                MAX_NAME_LENGTH
            ),
        }
    }

    /// Replace the in-memory catalog with the persisted one, if that document
    /// is still readable on its own.
    fn restore_catalog(&mut self) {
        let now = self.clock.now_ms();
        let max_metrics = self.config.metrics.max_metrics;
        let restored = self
            .store
            .load_catalog(self.fs.as_ref())
            .and_then(|catalog| MetricRegistry::from_catalog(max_metrics, catalog, now));

        match restored {
            Ok(registry) => {
                tracing::info!(metrics = registry.len(), "Kept persisted catalog, boot values lost");
                self.registry = registry;
            },
            Err(e) => tracing::debug!("Persisted catalog unusable ({}), keeping in-memory catalog", e),
        }
    }

    fn register_builtins(&mut self) {
        let now = self.clock.now_ms();
        for info in builtin::definitions() {
            let name = info.name.clone();
            match self.registry.register_if_absent(info, now) {
                RegisterOutcome::Registered => tracing::debug!(metric = %name, "Registered built-in metric"),
                RegisterOutcome::Preserved => {},
                RegisterOutcome::Rejected | RegisterOutcome::InvalidName => tracing::warn!(
                    metric = %name,
                    limit = self.registry.max_metrics(),
                    "Max metrics limit reached, built-in metric unavailable"
                ),
            }
        }
    }

    fn increment_counter(&mut self, name: &str, delta: i64) {
        let now = self.clock.now_ms();
        match self.registry.increment(name, delta, now) {
            Some(sample) => self.append(name, &sample),
            None => tracing::debug!(metric = %name, "Ignoring increment of unknown or non-counter metric"),
        }
    }

    fn set_gauge(&mut self, name: &str, value: f64) {
        let now = self.clock.now_ms();
        match self.registry.set_gauge(name, value, now) {
            Some(sample) => self.append(name, &sample),
            None => tracing::debug!(metric = %name, "Ignoring set of unknown or non-gauge metric"),
        }
    }

    fn record_histogram(&mut self, name: &str, value: f64) {
        let now = self.clock.now_ms();
        match self.registry.record(name, value, now) {
            Some(sample) => self.append(name, &sample),
            None => tracing::debug!(metric = %name, "Ignoring record of unknown or non-histogram metric"),
        }
    }

    fn append(&mut self, name: &str, sample: &MetricValue) {
        if !self.initialized {
            tracing::trace!(metric = %name, "Sink not started, sample kept in boot snapshot only");
            return;
        }

        let result = codec::encode_sample(sample)
            .and_then(|data| self.sink.log_metric(name, sample.timestamp, &data));
        if let Err(e) = result {
            tracing::warn!(metric = %name, "Failed to append sample: {}", e);
        }
    }

    fn history(&self, name: &str, since: u64) -> Vec<MetricValue> {
        let records = match self.sink.query_metrics(name, since) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(metric = %name, "Failed to query samples: {}", e);
                return Vec::new();
            },
        };

        records
            .iter()
            .filter_map(|record| match codec::decode_sample(&record.data) {
                Ok(sample) => Some(sample),
                Err(e) => {
                    tracing::warn!(metric = %name, timestamp = record.timestamp, "Skipping undecodable sample: {}", e);
                    None
                },
            })
            .collect()
    }

    fn save(&mut self) -> Result<()> {
        self.store
            .save(self.fs.as_mut(), &self.registry)
            .map_err(|e| {
                tracing::error!("Failed to save boot metrics: {}", e);
                e
            })
    }

    fn load(&mut self) -> Result<()> {
        let max_metrics = self.config.metrics.max_metrics;
        let registry = self.store.load(self.fs.as_ref(), max_metrics)?;
        self.registry = registry;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        let now = self.clock.now_ms();
        self.registry.reset(now);
        tracing::info!(metrics = self.registry.len(), "Reset boot metrics");
        self.save()
    }
}

impl std::fmt::Debug for MetricsSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MetricsSystem")
            .field("initialized", &state.initialized)
            .field("metrics", &state.registry.len())
            .field("store", &state.store)
            .finish()
    }
}
