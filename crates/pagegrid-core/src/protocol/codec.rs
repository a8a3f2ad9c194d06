//! JSON codec for [`LayoutRecord`] and [`CacheEntry`].
//!
//! Records are checked for [`LAYOUT_SCHEMA_VERSION`] on decode.  Cache
//! entries carry no version; a cache written by another build that fails to
//! parse is simply treated as a miss by its caller.

use thiserror::Error;

use crate::protocol::records::{CacheEntry, LayoutRecord, LAYOUT_SCHEMA_VERSION};

/// Errors that can occur while encoding or decoding persisted records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The bytes were not valid JSON for the expected shape.
    #[error("malformed layout payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The record was written with a schema version this build does not read.
    #[error("unsupported layout schema version: {0}")]
    UnsupportedVersion(u32),
}

// ── Records ───────────────────────────────────────────────────────────────────

/// Encodes a record as JSON.
///
/// # Errors
///
/// Returns [`CodecError::UnsupportedVersion`] if the record does not carry
/// [`LAYOUT_SCHEMA_VERSION`].
///
/// # Examples
///
/// ```rust
/// use pagegrid_core::protocol::{decode_record, encode_record, LayoutRecord};
/// use pagegrid_core::{HiddenBlockSet, LayoutSet};
///
/// let record = LayoutRecord::new("home", &LayoutSet::new(), &HiddenBlockSet::new());
/// let bytes = encode_record(&record).unwrap();
/// assert_eq!(decode_record(&bytes).unwrap(), record);
/// ```
pub fn encode_record(record: &LayoutRecord) -> Result<Vec<u8>, CodecError> {
    check_version(record.version)?;
    Ok(serde_json::to_vec(record)?)
}

/// Decodes a record from JSON and checks its schema version.
pub fn decode_record(bytes: &[u8]) -> Result<LayoutRecord, CodecError> {
    let record: LayoutRecord = serde_json::from_slice(bytes)?;
    check_version(record.version)?;
    Ok(record)
}

fn check_version(version: u32) -> Result<(), CodecError> {
    if version == LAYOUT_SCHEMA_VERSION {
        Ok(())
    } else {
        Err(CodecError::UnsupportedVersion(version))
    }
}

// ── Cache entries ─────────────────────────────────────────────────────────────

pub fn encode_cache_entry(entry: &CacheEntry) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(entry)?)
}

pub fn decode_cache_entry(bytes: &[u8]) -> Result<CacheEntry, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}
