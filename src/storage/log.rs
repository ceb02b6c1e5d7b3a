//! Append-only time-series log on the metrics volume.
//!
//! Each sample is one checksummed frame holding a bincode-encoded entry.
//! A torn frame at the tail (power lost mid-append) ends the readable log
//! and is cut off when the log is opened, so later appends stay readable.
//! When the file grows past its cap it is rewritten with the newest half.

use crate::core::Result;
use crate::metrics::types::MAX_NAME_LENGTH;
use crate::storage::codec::{read_frame, write_frame, FRAME_HEADER_LEN, MAX_SAMPLE_LEN};
use crate::storage::fs::Filesystem;
use crate::storage::sink::{validate_record, SinkRecord, TimeSeriesSink};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

/// Bincode overhead of a [`LogEntry`]: the timestamp plus two length prefixes.
const ENTRY_OVERHEAD: usize = 8 + 8 + 8;

/// Largest frame the metrics system appends.
pub const MAX_RECORD_LEN: usize = FRAME_HEADER_LEN + ENTRY_OVERHEAD + MAX_NAME_LENGTH + MAX_SAMPLE_LEN;

#[derive(Debug, Serialize, Deserialize)]
struct LogEntry {
    timestamp: u64,
    name: String,
    data: Vec<u8>,
}

/// File-backed [`TimeSeriesSink`].
#[derive(Debug)]
pub struct FileLog<F: Filesystem> {
    fs: F,
    path: String,
    max_bytes: u64,
    size: u64,
    active: bool,
}

impl<F: Filesystem> FileLog<F> {
    /// Log stored at `path`, rotated once it reaches `max_bytes`.
    pub fn new(fs: F, path: impl Into<String>, max_bytes: u64) -> Self {
        Self {
            fs,
            path: path.into(),
            max_bytes,
            size: 0,
            active: false,
        }
    }

    /// Current file size in bytes as tracked by the log
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Drop samples older than `max_age_ms` relative to `now`.
    ///
    /// Returns the number of samples removed.
    pub fn compact(&mut self, max_age_ms: u64, now: u64) -> Result<usize> {
        let cutoff = now.saturating_sub(max_age_ms);
        let records = self.read_records()?;
        let before = records.len();
        let kept: Vec<SinkRecord> = records
            .into_iter()
            .filter(|record| record.timestamp >= cutoff)
            .collect();
        let removed = before - kept.len();

        if removed > 0 {
            self.rewrite(&kept)?;
            tracing::debug!(removed, kept = kept.len(), "Compacted metrics log");
        }
        Ok(removed)
    }

    fn read_records(&self) -> Result<Vec<SinkRecord>> {
        let Some(bytes) = self.fs.read(&self.path)? else {
            return Ok(Vec::new());
        };
        Ok(self.parse(&bytes).0)
    }

    /// Decode frames up to the first unreadable one. Returns the records and
    /// the length of the readable prefix.
    fn parse(&self, bytes: &[u8]) -> (Vec<SinkRecord>, usize) {
        let mut input = bytes;
        let mut records = Vec::new();
        while !input.is_empty() {
            let entry = read_frame(&mut input)
                .and_then(|payload| Ok(bincode::deserialize::<LogEntry>(payload)?));
            match entry {
                Ok(entry) => records.push(SinkRecord {
                    timestamp: entry.timestamp,
                    name: entry.name,
                    data: entry.data,
                }),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path,
                        dropped_bytes = input.len(),
                        "Metrics log ends in an unreadable record: {}",
                        e
                    );
                    break;
                },
            }
        }
        (records, bytes.len() - input.len())
    }

    fn encoded_len(record: &SinkRecord) -> usize {
        FRAME_HEADER_LEN + ENTRY_OVERHEAD + record.name.len() + record.data.len()
    }

    fn encode(record: &SinkRecord, out: &mut BytesMut) -> Result<()> {
        let payload = bincode::serialize(&LogEntry {
            timestamp: record.timestamp,
            name: record.name.clone(),
            data: record.data.clone(),
        })?;
        write_frame(out, &payload)
    }

    fn rewrite(&mut self, records: &[SinkRecord]) -> Result<()> {
        let mut out = BytesMut::new();
        for record in records {
            Self::encode(record, &mut out)?;
        }
        self.fs.write(&self.path, &out)?;
        self.size = out.len() as u64;
        Ok(())
    }

    /// Keep the newest records that fit in half the cap. The newest record
    /// is always kept.
    fn rotate(&mut self) -> Result<()> {
        let records = self.read_records()?;
        let budget = self.max_bytes / 2;

        let mut used = 0u64;
        let mut first_kept = records.len();
        for (index, record) in records.iter().enumerate().rev() {
            let framed = Self::encoded_len(record) as u64;
            if used + framed > budget && first_kept < records.len() {
                break;
            }
            used += framed;
            first_kept = index;
        }

        tracing::info!(
            path = %self.path,
            dropped = first_kept,
            kept = records.len() - first_kept,
            "Rotating metrics log"
        );
        self.rewrite(&records[first_kept..])
    }
}

impl<F: Filesystem> TimeSeriesSink for FileLog<F> {
    fn begin(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }

        match self.fs.read(&self.path)? {
            Some(bytes) => {
                let (records, valid) = self.parse(&bytes);
                if valid < bytes.len() {
                    tracing::warn!(
                        path = %self.path,
                        kept = records.len(),
                        dropped_bytes = bytes.len() - valid,
                        "Truncating torn metrics log tail"
                    );
                    self.fs.write(&self.path, &bytes[..valid])?;
                }
                self.size = valid as u64;
            },
            None => {
                self.fs.write(&self.path, &[])?;
                self.size = 0;
            },
        }
        self.active = true;
        Ok(())
    }

    fn end(&mut self) {
        self.active = false;
    }

    fn log_metric(&mut self, name: &str, timestamp: u64, data: &[u8]) -> Result<()> {
        validate_record(self.active, name, data)?;

        let mut out = BytesMut::new();
        Self::encode(
            &SinkRecord {
                timestamp,
                name: name.to_string(),
                data: data.to_vec(),
            },
            &mut out,
        )?;
        self.fs.append(&self.path, &out)?;
        self.size += out.len() as u64;

        if self.size >= self.max_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    fn query_metrics(&self, name: &str, since: u64) -> Result<Vec<SinkRecord>> {
        Ok(self
            .read_records()?
            .into_iter()
            .filter(|record| record.matches(name, since))
            .collect())
    }

    fn record_count(&self) -> Result<usize> {
        Ok(self.read_records()?.len())
    }

    fn clear(&mut self) -> Result<()> {
        self.fs.remove(&self.path)?;
        if self.active {
            self.fs.write(&self.path, &[])?;
        }
        self.size = 0;
        Ok(())
    }
}
