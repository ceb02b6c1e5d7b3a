//! Host resource readings polled into the built-in gauges.

use parking_lot::Mutex;
use std::sync::Arc;

/// Read-only view of the host's resources.
pub trait SystemProbe: Send {
    /// Currently free heap in bytes.
    fn free_heap(&self) -> u64;

    /// Lowest free heap observed since boot, in bytes.
    fn min_free_heap(&self) -> u64;

    /// Radio signal strength in dBm, `None` while not connected.
    fn signal_strength(&self) -> Option<i32>;
}

/// Probe for hosts without resource introspection. Reports zero heap and no
/// connectivity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl SystemProbe for NullProbe {
    fn free_heap(&self) -> u64 {
        0
    }

    fn min_free_heap(&self) -> u64 {
        0
    }

    fn signal_strength(&self) -> Option<i32> {
        None
    }
}

/// Resource readings at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceReadings {
    /// Free heap bytes.
    pub free_heap: u64,
    /// Lowest free heap bytes seen.
    pub min_free_heap: u64,
    /// Signal strength in dBm, `None` when not connected.
    pub signal_strength: Option<i32>,
}

/// Probe returning whatever readings were last stored. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct StaticProbe {
    readings: Arc<Mutex<ResourceReadings>>,
}

impl StaticProbe {
    /// Probe starting at `readings`.
    pub fn new(readings: ResourceReadings) -> Self {
        Self {
            readings: Arc::new(Mutex::new(readings)),
        }
    }

    /// Replace every reading.
    pub fn set(&self, readings: ResourceReadings) {
        *self.readings.lock() = readings;
    }

    /// Report a new free-heap reading, lowering the minimum if needed.
    pub fn set_free_heap(&self, bytes: u64) {
        let mut readings = self.readings.lock();
        readings.free_heap = bytes;
        if readings.min_free_heap == 0 || bytes < readings.min_free_heap {
            readings.min_free_heap = bytes;
        }
    }

    /// Report a new signal strength.
    pub fn set_signal_strength(&self, dbm: Option<i32>) {
        self.readings.lock().signal_strength = dbm;
    }
}

impl SystemProbe for StaticProbe {
    fn free_heap(&self) -> u64 {
        self.readings.lock().free_heap
    }

    fn min_free_heap(&self) -> u64 {
        self.readings.lock().min_free_heap
    }

    fn signal_strength(&self) -> Option<i32> {
        self.readings.lock().signal_strength
    }
}
