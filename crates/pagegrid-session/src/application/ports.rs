//! Ports: the traits the edit session depends on.
//!
//! Infrastructure implementations live in [`crate::infrastructure`]; tests
//! use recording fakes.

use std::path::PathBuf;

use async_trait::async_trait;
use pagegrid_core::{Breakpoint, CacheEntry, CodecError, LayoutItem, LayoutRecord};
use thiserror::Error;

/// Errors returned by a [`LayoutStore`].
///
/// "No saved layout" is not an error: [`LayoutStore::fetch`] returns `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The page key is not registered on the server.
    #[error("unknown page: {0}")]
    UnknownPage(String),

    /// The payload mentions block ids the page does not register.
    #[error("unknown blocks for {page_key}: {}", .ids.join(", "))]
    UnknownBlocks { page_key: String, ids: Vec<String> },

    /// The payload carries a schema version the server does not accept.
    #[error("unsupported layout schema version: {0}")]
    UnsupportedVersion(u32),

    /// The request did not complete.
    #[error("transport error: {0}")]
    Transport(String),
}

/// The persisted per-page layout resource (`/user-layouts/{pageKey}`).
#[async_trait]
pub trait LayoutStore: Send + Sync {
    /// Fetches the current user's record for `page_key`.
    async fn fetch(&self, page_key: &str) -> Result<Option<LayoutRecord>, StoreError>;

    /// Stores `record` and returns it as the server normalized it.
    async fn save(&self, record: LayoutRecord) -> Result<LayoutRecord, StoreError>;

    /// Clears the record for `page_key`.
    ///
    /// Returns what the server still holds afterwards, normally `None`.
    async fn reset(&self, page_key: &str) -> Result<Option<LayoutRecord>, StoreError>;
}

/// Errors returned by a [`LayoutCache`].  Callers log and ignore them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error accessing cache at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("cache lock poisoned")]
    Poisoned,
}

/// Best-effort local copy of the last known layouts, keyed `"<namespace>/<pageKey>"`.
pub trait LayoutCache: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;
    fn write(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// The drag/resize grid widget.
///
/// The engine pushes items with [`GridWidget::set_items`]; the widget reports
/// changes back through `EditSession::apply_items`.
#[cfg_attr(test, mockall::automock)]
pub trait GridWidget: Send + Sync {
    fn set_items(&self, breakpoint: Breakpoint, items: &[LayoutItem]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_blocks_error_lists_ids() {
        let err = StoreError::UnknownBlocks {
            page_key: "home".to_string(),
            ids: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "unknown blocks for home: a, b");
    }

    #[test]
    fn test_cache_error_wraps_codec_error_transparently() {
        let err = CacheError::from(CodecError::UnsupportedVersion(3));
        assert_eq!(err.to_string(), "unsupported layout schema version: 3");
    }
}
