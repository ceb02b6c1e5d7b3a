//! Encoding of everything the metrics system puts on flash.
//!
//! - Catalog document: JSON object keyed by metric name, each entry holding
//!   an integer `type` tag and a description (plus optional unit/category).
//! - Boot snapshot block: versioned header followed by one framed record per
//!   metric.
//! - Samples: one bincode-encoded [`MetricValue`] per sink record.
//!
//! Frames are `len: u32 LE | crc32: u32 LE | payload`.

use crate::core::{MetricsError, Result};
use crate::metrics::types::{MetricInfo, MetricKind, MetricValue};
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Leading bytes of a boot snapshot block.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"NMBS";

/// Current boot snapshot layout. Bump on any change to [`MetricValue`].
pub const SNAPSHOT_VERSION: u8 = 1;

/// Magic, version, three reserved bytes, record count.
pub const SNAPSHOT_HEADER_LEN: usize = 4 + 1 + 3 + 4;

/// Length and checksum preceding every framed payload.
pub const FRAME_HEADER_LEN: usize = 4 + 4;

/// Largest encoded sample: timestamp, variant tag, histogram accumulator.
pub const MAX_SAMPLE_LEN: usize = 8 + 4 + (4 * 8 + 4);

#[derive(Debug, Serialize, Deserialize)]
struct CatalogEntryDoc {
    #[serde(rename = "type")]
    kind: u8,
    description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    unit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    category: String,
}

#[derive(Serialize)]
struct SnapshotRecordRef<'a> {
    name: &'a str,
    value: &'a MetricValue,
}

#[derive(Deserialize)]
struct SnapshotRecord {
    name: String,
    value: MetricValue,
}

/// Serialize the catalog to its JSON document.
pub fn encode_catalog(catalog: &BTreeMap<String, MetricInfo>) -> Result<Vec<u8>> {
    let doc: BTreeMap<&str, CatalogEntryDoc> = catalog
        .iter()
        .map(|(name, info)| {
            (
                name.as_str(),
                CatalogEntryDoc {
                    kind: info.kind.as_tag(),
                    description: info.description.clone(),
                    unit: info.unit.clone(),
                    category: info.category.clone(),
                },
            )
        })
        .collect();

    Ok(serde_json::to_vec(&doc)?)
}

/// Parse a catalog document.
pub fn decode_catalog(bytes: &[u8]) -> Result<BTreeMap<String, MetricInfo>> {
    let doc: BTreeMap<String, CatalogEntryDoc> = serde_json::from_slice(bytes)?;

    doc.into_iter()
        .map(|(name, entry)| -> Result<(String, MetricInfo)> {
            let kind = MetricKind::from_tag(entry.kind).ok_or_else(|| {
                MetricsError::corrupt(format!("metric '{}' has unknown type {}", name, entry.kind))
            })?;
            let info = MetricInfo {
                name: name.clone(),
                kind,
                description: entry.description,
                unit: entry.unit,
                category: entry.category,
            };
            Ok((name, info))
        })
        .collect()
}

/// Serialize the boot snapshot map to a versioned block.
pub fn encode_snapshot(boot: &BTreeMap<String, MetricValue>) -> Result<Vec<u8>> {
    let count = u32::try_from(boot.len())
        .map_err(|_| MetricsError::Encoding(format!("{} records do not fit a block", boot.len())))?;

    let mut out = BytesMut::with_capacity(SNAPSHOT_HEADER_LEN + boot.len() * 64);
    out.put_slice(&SNAPSHOT_MAGIC);
    out.put_u8(SNAPSHOT_VERSION);
    out.put_bytes(0, 3);
    out.put_u32_le(count);

    for (name, value) in boot {
        let payload = bincode::serialize(&SnapshotRecordRef { name, value })?;
        write_frame(&mut out, &payload)?;
    }

    Ok(out.to_vec())
}

/// Parse a boot snapshot block.
pub fn decode_snapshot(bytes: &[u8]) -> Result<BTreeMap<String, MetricValue>> {
    let mut input = bytes;
    if input.len() < SNAPSHOT_HEADER_LEN {
        return Err(MetricsError::corrupt(format!(
            "snapshot block truncated: {} bytes",
            bytes.len()
        )));
    }

    let mut magic = [0u8; 4];
    input.copy_to_slice(&mut magic);
    if magic != SNAPSHOT_MAGIC {
        return Err(MetricsError::corrupt("snapshot block has bad magic"));
    }

    let version = input.get_u8();
    if version != SNAPSHOT_VERSION {
        return Err(MetricsError::corrupt(format!(
            "unsupported snapshot version {}",
            version
        )));
    }
    input.advance(3);
    let count = input.get_u32_le();

    let mut boot = BTreeMap::new();
    for index in 0..count {
        let payload = read_frame(&mut input)
            .map_err(|e| MetricsError::corrupt(format!("snapshot record {}: {}", index, e)))?;
        let record: SnapshotRecord = bincode::deserialize(payload)?;
        if boot.insert(record.name.clone(), record.value).is_some() {
            return Err(MetricsError::corrupt(format!(
                "duplicate snapshot record '{}'",
                record.name
            )));
        }
    }

    if input.has_remaining() {
        return Err(MetricsError::corrupt(format!(
            "{} trailing bytes after snapshot records",
            input.remaining()
        )));
    }

    Ok(boot)
}

/// Encode one sink sample.
pub fn encode_sample(sample: &MetricValue) -> Result<Vec<u8>> {
    Ok(bincode::serialize(sample)?)
}

/// Decode one sink sample.
pub fn decode_sample(bytes: &[u8]) -> Result<MetricValue> {
    Ok(bincode::deserialize(bytes)?)
}

/// Append a length-and-checksum framed payload.
pub fn write_frame(out: &mut BytesMut, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| MetricsError::Encoding(format!("frame of {} bytes", payload.len())))?;
    out.put_u32_le(len);
    out.put_u32_le(crc32fast::hash(payload));
    out.put_slice(payload);
    Ok(())
}

/// Take one framed payload off the front of `input`.
///
/// Fails on a truncated frame or a checksum mismatch; `input` is only
/// advanced on success.
pub fn read_frame<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let data: &'a [u8] = *input;
    if data.len() < FRAME_HEADER_LEN {
        return Err(MetricsError::corrupt("truncated frame header"));
    }

    let mut header = &data[..FRAME_HEADER_LEN];
    let len = header.get_u32_le() as usize;
    let crc = header.get_u32_le();

    let body = &data[FRAME_HEADER_LEN..];
    if body.len() < len {
        return Err(MetricsError::corrupt(format!(
            "frame needs {} bytes, {} left",
            len,
            body.len()
        )));
    }

    let payload = &body[..len];
    if crc32fast::hash(payload) != crc {
        return Err(MetricsError::corrupt("frame checksum mismatch"));
    }

    *input = &body[len..];
    Ok(payload)
}
