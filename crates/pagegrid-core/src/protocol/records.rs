//! Records exchanged with the layout resource and the local fallback cache.
//!
//! # Resource shape
//!
//! ```text
//! GET    /user-layouts/{pageKey}  → LayoutRecord | not found
//! PUT    /user-layouts/{pageKey}  ← LayoutRecord → LayoutRecord (normalized)
//! DELETE /user-layouts/{pageKey}  → Option<LayoutRecord>
//! ```
//!
//! Layouts travel as [`RawLayoutSet`] in both directions: whatever comes back
//! is untrusted until the merger has reconciled it.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::{HiddenBlockSet, LayoutSet, RawLayoutSet};

/// The only schema version this build reads or writes.
pub const LAYOUT_SCHEMA_VERSION: u32 = 1;

/// Prefix of the per-page layout resource.
pub const RESOURCE_PREFIX: &str = "/user-layouts";

/// Returns the resource path for `page_key`, e.g. `/user-layouts/home`.
///
/// Page keys may contain `:` (`module:pharmacy:inventory`); they are used
/// verbatim as the trailing path segment.
pub fn resource_path(page_key: &str) -> String {
    format!("{RESOURCE_PREFIX}/{page_key}")
}

/// One user's persisted arrangement for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRecord {
    pub version: u32,
    pub page_key: String,
    #[serde(default)]
    pub layouts: RawLayoutSet,
    #[serde(default)]
    pub hidden_blocks: Vec<String>,
}

impl LayoutRecord {
    /// Builds the record sent when saving `layouts` and `hidden` for `page_key`.
    pub fn new(page_key: impl Into<String>, layouts: &LayoutSet, hidden: &HiddenBlockSet) -> Self {
        Self {
            version: LAYOUT_SCHEMA_VERSION,
            page_key: page_key.into(),
            layouts: layouts.to_raw(),
            hidden_blocks: hidden.to_vec(),
        }
    }

    /// Returns the cache entry holding the same data.
    pub fn to_cache_entry(&self) -> CacheEntry {
        CacheEntry {
            layouts: self.layouts.clone(),
            hidden_blocks: self.hidden_blocks.clone(),
        }
    }
}

/// Local cache value, stored under `"<namespace>/<pageKey>"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub layouts: RawLayoutSet,
    #[serde(default, rename = "hiddenBlocks")]
    pub hidden_blocks: Vec<String>,
}

/// Returns the cache key for `page_key` under `namespace`.
pub fn cache_key(namespace: &str, page_key: &str) -> String {
    format!("{namespace}/{page_key}")
}
