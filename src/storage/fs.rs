//! Filesystem seam for the metrics volume.
//!
//! On a device this is a small flash filesystem. [`DirFs`] maps it onto a
//! host directory and [`MemFs`] keeps it in memory with fault injection for
//! tests. Paths are plain file names relative to the volume root.

use crate::core::{MetricsError, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Minimal file operations the persistence layer needs.
pub trait Filesystem: Send {
    /// Make the volume usable, formatting it if allowed and necessary.
    fn mount(&mut self, format_if_unmountable: bool) -> Result<()>;

    /// Whole-file read. `Ok(None)` when the file does not exist.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the file contents.
    fn write(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Append to the file, creating it if missing.
    fn append(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Delete the file. Missing files are not an error.
    fn remove(&mut self, path: &str) -> Result<()>;
}

/// Volume backed by a directory on the host filesystem.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    /// Volume rooted at `root`. Nothing is touched until `mount`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the volume.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    fn format(&self) -> std::io::Result<()> {
        match fs::symlink_metadata(&self.root) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&self.root)?,
            Ok(_) => fs::remove_file(&self.root)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {},
            Err(e) => return Err(e),
        }
        fs::create_dir_all(&self.root)
    }
}

impl Filesystem for DirFs {
    fn mount(&mut self, format_if_unmountable: bool) -> Result<()> {
        let usable = match fs::metadata(&self.root) {
            Ok(meta) => meta.is_dir(),
            Err(e) if e.kind() == ErrorKind::NotFound => fs::create_dir_all(&self.root).is_ok(),
            Err(_) => false,
        };
        if usable {
            return Ok(());
        }

        if !format_if_unmountable {
            return Err(MetricsError::Mount(format!(
                "{} is not a usable directory",
                self.root.display()
            )));
        }

        tracing::warn!("Formatting metrics volume at {}", self.root.display());
        self.format().map_err(|e| {
            MetricsError::Mount(format!("format of {} failed: {}", self.root.display(), e))
        })
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.resolve(path)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let target = self.resolve(path);
        let mut staging = target.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);

        fs::write(&staging, data)?;
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn append(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.resolve(path))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        match fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MemVolume {
    files: HashMap<String, Vec<u8>>,
    unmountable: bool,
    failing: HashSet<String>,
    formats: usize,
}

/// In-memory volume. Clones share the same files.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    volume: Arc<Mutex<MemVolume>>,
}

impl MemFs {
    /// Empty, mountable volume.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `mount` fail unless formatting is allowed.
    pub fn set_unmountable(&self, unmountable: bool) {
        self.volume.lock().unmountable = unmountable;
    }

    /// Make every write and append to `path` fail.
    pub fn fail_writes_to(&self, path: &str) {
        self.volume.lock().failing.insert(path.to_string());
    }

    /// Undo [`MemFs::fail_writes_to`].
    pub fn heal(&self, path: &str) {
        self.volume.lock().failing.remove(path);
    }

    /// Raw file contents.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.volume.lock().files.get(path).cloned()
    }

    /// Overwrite raw file contents, bypassing fault injection.
    pub fn put(&self, path: &str, data: impl Into<Vec<u8>>) {
        self.volume.lock().files.insert(path.to_string(), data.into());
    }

    /// Whether `path` holds a file.
    pub fn exists(&self, path: &str) -> bool {
        self.volume.lock().files.contains_key(path)
    }

    /// Number of times the volume has been formatted.
    pub fn format_count(&self) -> usize {
        self.volume.lock().formats
    }

    fn check_writable(volume: &MemVolume, path: &str) -> Result<()> {
        if volume.failing.contains(path) {
            return Err(MetricsError::storage(format!("write to {} failed", path)));
        }
        Ok(())
    }
}

impl Filesystem for MemFs {
    fn mount(&mut self, format_if_unmountable: bool) -> Result<()> {
        let mut volume = self.volume.lock();
        if !volume.unmountable {
            return Ok(());
        }
        if !format_if_unmountable {
            return Err(MetricsError::Mount("volume is unmountable".to_string()));
        }
        volume.files.clear();
        volume.unmountable = false;
        volume.formats += 1;
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(path))
    }

    fn write(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut volume = self.volume.lock();
        Self::check_writable(&volume, path)?;
        volume.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn append(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut volume = self.volume.lock();
        Self::check_writable(&volume, path)?;
        volume
            .files
            .entry(path.to_string())
            .or_default()
            .extend_from_slice(data);
        Ok(())
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        self.volume.lock().files.remove(path);
        Ok(())
    }
}
