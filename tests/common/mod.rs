//! Common test utilities and fixtures.

#![allow(dead_code)]

use nodemetrics::core::{Config, ConfigBuilder, ManualClock};
use nodemetrics::monitoring::{ResourceReadings, StaticProbe};
use nodemetrics::storage::MemFs;
use nodemetrics::MetricsSystem;

/// A metrics system on an in-memory volume with a hand-driven clock.
pub struct Fixture {
    pub fs: MemFs,
    pub clock: ManualClock,
    pub probe: StaticProbe,
    pub config: Config,
    pub system: MetricsSystem,
}

impl Fixture {
    /// Simulate a reboot: a fresh system on the same volume, clock and probe.
    pub fn restart(&self) -> MetricsSystem {
        let system = build_system(&self.config, &self.fs, &self.clock, &self.probe);
        system.begin().unwrap();
        system
    }
}

/// Test fixture builder with sensible defaults.
pub struct FixtureBuilder {
    config: Config,
    fs: MemFs,
    start_ms: u64,
    readings: ResourceReadings,
}

impl FixtureBuilder {
    /// Defaults: no built-in metrics, volume mountable, clock at zero.
    pub fn new() -> Self {
        Self {
            config: ConfigBuilder::new()
                .register_system_metrics(false)
                .build()
                .unwrap(),
            fs: MemFs::new(),
            start_ms: 0,
            readings: ResourceReadings {
                free_heap: 48_000,
                min_free_heap: 32_000,
                signal_strength: Some(-55),
            },
        }
    }

    pub fn with_system_metrics(mut self) -> Self {
        self.config.metrics.register_system_metrics = true;
        self
    }

    pub fn max_metrics(mut self, count: usize) -> Self {
        self.config.metrics.max_metrics = count;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn volume(mut self, fs: MemFs) -> Self {
        self.fs = fs;
        self
    }

    pub fn start_ms(mut self, ms: u64) -> Self {
        self.start_ms = ms;
        self
    }

    /// Build without calling `begin`.
    pub fn build(self) -> Fixture {
        let clock = ManualClock::new(self.start_ms);
        let probe = StaticProbe::new(self.readings);
        let system = build_system(&self.config, &self.fs, &clock, &probe);

        Fixture {
            fs: self.fs,
            clock,
            probe,
            config: self.config,
            system,
        }
    }

    /// Build and start the system.
    pub fn start(self) -> Fixture {
        let fixture = self.build();
        fixture.system.begin().unwrap();
        fixture
    }
}

fn build_system(
    config: &Config,
    fs: &MemFs,
    clock: &ManualClock,
    probe: &StaticProbe,
) -> MetricsSystem {
    MetricsSystem::builder(config.clone())
        .filesystem(fs.clone())
        .clock(clock.clone())
        .probe(probe.clone())
        .build()
        .unwrap()
}
