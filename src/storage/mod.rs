//! Persistence for the metrics system.
//!
//! - `fs`: the volume the node persists to
//! - `codec`: on-flash encodings
//! - `boot_store`: catalog and boot snapshot files
//! - `sink`: the time-series sink seam plus an in-memory implementation
//! - `log`: append-only file-backed sink

pub mod boot_store;
pub mod codec;
pub mod fs;
pub mod log;
pub mod sink;

pub use boot_store::BootStore;
pub use fs::{DirFs, Filesystem, MemFs};
pub use log::FileLog;
pub use sink::{MemorySink, SinkRecord, TimeSeriesSink};
