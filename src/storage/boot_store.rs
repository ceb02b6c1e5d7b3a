//! Persistence of the catalog and boot snapshot.
//!
//! Two files: the catalog document, then the snapshot block. A save that
//! fails after the first file was written leaves the pair inconsistent; the
//! next load detects the mismatch and the caller falls back to a reset,
//! keeping the catalog declarations when the catalog document alone is sound.

use crate::core::{MetricsError, Result};
use crate::metrics::registry::MetricRegistry;
use crate::metrics::types::MetricInfo;
use crate::storage::codec;
use crate::storage::fs::Filesystem;
use std::collections::BTreeMap;

/// Locations of the two boot-state files on the metrics volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootStore {
    catalog_path: String,
    snapshot_path: String,
}

impl BootStore {
    /// Store using the given file names on the volume.
    pub fn new(catalog_path: impl Into<String>, snapshot_path: impl Into<String>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    /// Catalog document file name.
    pub fn catalog_path(&self) -> &str {
        &self.catalog_path
    }

    /// Snapshot block file name.
    pub fn snapshot_path(&self) -> &str {
        &self.snapshot_path
    }

    /// Write the catalog document, then the snapshot block.
    pub fn save(&self, fs: &mut dyn Filesystem, registry: &MetricRegistry) -> Result<()> {
        let catalog = codec::encode_catalog(registry.catalog())?;
        let snapshot = codec::encode_snapshot(registry.boot())?;

        fs.write(&self.catalog_path, &catalog).map_err(|e| {
            MetricsError::storage(format!("writing {} failed: {}", self.catalog_path, e))
        })?;
        fs.write(&self.snapshot_path, &snapshot).map_err(|e| {
            MetricsError::storage(format!("writing {} failed: {}", self.snapshot_path, e))
        })?;

        tracing::debug!(
            metrics = registry.len(),
            catalog_bytes = catalog.len(),
            snapshot_bytes = snapshot.len(),
            "Saved boot metrics"
        );
        Ok(())
    }

    /// Read both files and rebuild a registry holding at most `max_metrics`.
    ///
    /// Nothing is returned unless both files decode and agree with each other.
    pub fn load(&self, fs: &dyn Filesystem, max_metrics: usize) -> Result<MetricRegistry> {
        let catalog = self.load_catalog(fs)?;
        let snapshot_bytes = fs
            .read(&self.snapshot_path)?
            .ok_or_else(|| MetricsError::NotFound(self.snapshot_path.clone()))?;

        let boot = codec::decode_snapshot(&snapshot_bytes)?;
        MetricRegistry::from_parts(max_metrics, catalog, boot)
    }

    /// Read and decode only the catalog document.
    pub fn load_catalog(&self, fs: &dyn Filesystem) -> Result<BTreeMap<String, MetricInfo>> {
        let catalog_bytes = fs
            .read(&self.catalog_path)?
            .ok_or_else(|| MetricsError::NotFound(self.catalog_path.clone()))?;
        codec::decode_catalog(&catalog_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::{MetricInfo, MetricKind};
    use crate::storage::fs::MemFs;

    fn populated() -> MetricRegistry {
        let mut registry = MetricRegistry::new(8);
        registry.register(MetricInfo::new("x", MetricKind::Counter, "hits"), 0);
        registry.register(
            MetricInfo::new("h", MetricKind::Histogram, "latency").with_unit("ms"),
            0,
        );
        registry.increment("x", 7, 3);
        registry.record("h", 2.0, 4);
        registry
    }

    #[test]
    fn test_save_then_load() {
        let mut fs = MemFs::new();
        let store = BootStore::new("cat.json", "boot.bin");
        let registry = populated();

        store.save(&mut fs, &registry).unwrap();
        let loaded = store.load(&fs, 8).unwrap();

        assert_eq!(loaded.catalog(), registry.catalog());
        assert_eq!(loaded.boot(), registry.boot());
    }

    #[test]
    fn test_load_missing_files() {
        let fs = MemFs::new();
        let store = BootStore::new("cat.json", "boot.bin");

        let err = store.load(&fs, 8).unwrap_err();
        assert!(matches!(err, MetricsError::NotFound(_)));
    }

    #[test]
    fn test_partial_save_is_detected_on_load() {
        let mut fs = MemFs::new();
        let store = BootStore::new("cat.json", "boot.bin");
        let mut registry = populated();
        store.save(&mut fs, &registry).unwrap();

        registry.register(MetricInfo::new("late", MetricKind::Gauge, ""), 9);
        fs.fail_writes_to("boot.bin");
        assert!(store.save(&mut fs, &registry).is_err());

        let err = store.load(&fs, 8).unwrap_err();
        assert!(matches!(err, MetricsError::Corrupt { .. }));
    }

    #[test]
    fn test_catalog_readable_when_snapshot_is_not() {
        let mut fs = MemFs::new();
        let store = BootStore::new("cat.json", "boot.bin");
        let registry = populated();
        store.save(&mut fs, &registry).unwrap();
        fs.put("boot.bin", vec![0u8; 5]);

        assert!(store.load(&fs, 8).is_err());
        assert_eq!(&store.load_catalog(&fs).unwrap(), registry.catalog());
    }

    #[test]
    fn test_load_respects_capacity() {
        let mut fs = MemFs::new();
        let store = BootStore::new("cat.json", "boot.bin");
        store.save(&mut fs, &populated()).unwrap();

        assert!(store.load(&fs, 1).is_err());
    }
}
