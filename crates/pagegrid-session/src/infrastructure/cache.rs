//! Local fallback caches for the last known layout of each page.
//!
//! - [`MemoryLayoutCache`] keeps entries in a map for the lifetime of the
//!   process (tests, or when the file cache is disabled).
//! - [`FileLayoutCache`] writes one JSON file per key under a directory, so a
//!   restarted client can show the user's arrangement before the server
//!   answers.
//!
//! Keys look like `"pagegrid/module:pharmacy:inventory"`.  Characters outside
//! `[A-Za-z0-9_-]` are written as `%XX` in file names, which keeps keys with
//! `/` and `:` on a single, portable path component.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use pagegrid_core::protocol::{decode_cache_entry, encode_cache_entry};
use pagegrid_core::CacheEntry;
use tracing::debug;

pub use crate::application::ports::CacheError;
use crate::application::ports::LayoutCache;

// ── MemoryLayoutCache ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryLayoutCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryLayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LayoutCache for MemoryLayoutCache {
    fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// ── FileLayoutCache ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileLayoutCache {
    dir: PathBuf,
}

impl FileLayoutCache {
    /// Creates a cache rooted at `dir`.  The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file that holds the entry for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", escape_key(key)))
    }
}

impl LayoutCache for FileLayoutCache {
    fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(decode_cache_entry(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let bytes = encode_cache_entry(entry)?;
        std::fs::write(&path, bytes).map_err(|source| CacheError::Io { path: path.clone(), source })?;
        debug!(path = %path.display(), "cache entry written");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

/// Escapes every byte outside `[A-Za-z0-9_-]` as `%XX`.
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

// ── Tests ─────────────────────────────────────────────────────────────────────
