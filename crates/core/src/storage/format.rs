use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::CoreError;
use crate::models::record::PortfolioRecord;

/// Marker identifying a coin-tracker store snapshot.
pub const FORMAT_MARKER: &str = "coin-tracker-store";

/// Current snapshot format version.
pub const CURRENT_VERSION: u16 = 1;

/// Layout:
/// ```text
/// { "format": "coin-tracker-store", "version": 1, "records": [PortfolioRecord, ...] }
/// ```
#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    format: &'a str,
    version: u16,
    records: &'a [PortfolioRecord],
}

#[derive(Deserialize)]
struct SnapshotHeader {
    format: String,
    version: u16,
}

#[derive(Deserialize)]
struct SnapshotFile {
    records: Vec<PortfolioRecord>,
}

/// Serialize records into snapshot bytes.
pub fn write_snapshot(records: &[PortfolioRecord]) -> Result<Vec<u8>, CoreError> {
    let file = SnapshotFileRef {
        format: FORMAT_MARKER,
        version: CURRENT_VERSION,
        records,
    };
    serde_json::to_vec_pretty(&file)
        .map_err(|e| CoreError::Serialization(format!("Failed to serialize store snapshot: {e}")))
}

/// Parse snapshot bytes back into records.
///
/// The header is checked before the records are decoded, so a snapshot from a
/// newer version fails with `UnsupportedVersion` rather than a decode error.
pub fn read_snapshot(data: &[u8]) -> Result<Vec<PortfolioRecord>, CoreError> {
    let header: SnapshotHeader = serde_json::from_slice(data).map_err(|e| {
        CoreError::InvalidFileFormat(format!("Not a coin-tracker store snapshot: {e}"))
    })?;

    if header.format != FORMAT_MARKER {
        return Err(CoreError::InvalidFileFormat(format!(
            "Unexpected format marker '{}'",
            header.format
        )));
    }
    if header.version == 0 || header.version > CURRENT_VERSION {
        return Err(CoreError::UnsupportedVersion(header.version));
    }

    let file: SnapshotFile = serde_json::from_slice(data)
        .map_err(|e| CoreError::Deserialization(format!("Failed to decode records: {e}")))?;

    let mut seen = HashSet::new();
    for record in &file.records {
        if record.coin_id != record.coin.id {
            return Err(CoreError::InvalidFileFormat(format!(
                "Record {} has coin_id '{}' but carries coin '{}'",
                record.key(),
                record.coin_id,
                record.coin.id
            )));
        }
        if !seen.insert(record.key()) {
            return Err(CoreError::InvalidFileFormat(format!(
                "Duplicate record key {}",
                record.key()
            )));
        }
    }

    Ok(file.records)
}
