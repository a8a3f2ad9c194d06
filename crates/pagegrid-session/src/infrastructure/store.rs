//! In-memory layout resource.
//!
//! Behaves like the `/user-layouts/{pageKey}` endpoint of the server: records
//! are keyed by username and page key, payloads are validated against the
//! built-in page registry, and what gets stored is normalized for the user's
//! current permissions.
//!
//! # Normalization on the server side
//!
//! The server is stricter per item and looser per breakpoint than the editing
//! client: an item that overlaps one already kept is dropped on its own,
//! instead of the whole breakpoint falling back to its defaults.  The client
//! merges the response with its catalog afterwards, so dropped blocks come
//! back at their default position.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pagegrid_core::catalog::{find_page, PageDefinition};
use pagegrid_core::{
    clamp_item, filter_allowed_blocks, AccessChecker, Breakpoint, HiddenBlockSet, LayoutItem,
    LayoutRecord, LayoutSet, PageCatalog, UserContext, LAYOUT_SCHEMA_VERSION,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::ports::{LayoutStore, StoreError};

/// `(username, page_key)`
type RecordKey = (String, String);

/// Layout resource for one user over a record table that can be shared.
#[derive(Clone)]
pub struct InMemoryLayoutStore {
    records: Arc<Mutex<HashMap<RecordKey, LayoutRecord>>>,
    user: UserContext,
    checker: Arc<dyn AccessChecker>,
    offline: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryLayoutStore {
    pub fn new(user: UserContext, checker: Arc<dyn AccessChecker>) -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            user,
            checker,
            offline: Arc::new(AtomicBool::new(false)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A store for another user over the same records.
    pub fn for_user(&self, user: UserContext, checker: Arc<dyn AccessChecker>) -> Self {
        Self {
            records: Arc::clone(&self.records),
            user,
            checker,
            offline: Arc::new(AtomicBool::new(false)),
            saves: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every following request fail with [`StoreError::Transport`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of accepted saves made through this store.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Transport("layout service unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    fn key(&self, page_key: &str) -> RecordKey {
        (self.user.username.clone(), page_key.to_string())
    }

    /// Block ids of `page` the user may currently see.
    fn allowed_ids(&self, page: &PageDefinition) -> HashSet<String> {
        let blocks = PageCatalog::from_definition(page).blocks;
        filter_allowed_blocks(&blocks, &self.user, self.checker.as_ref(), None)
            .into_iter()
            .map(|block| block.id.clone())
            .collect()
    }
}

fn lookup_page(page_key: &str) -> Result<&'static PageDefinition, StoreError> {
    find_page(page_key).ok_or_else(|| StoreError::UnknownPage(page_key.to_string()))
}

/// Rejects unsupported versions and ids the page does not register.
fn validate(page: &PageDefinition, record: &LayoutRecord) -> Result<(), StoreError> {
    if record.version != LAYOUT_SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion(record.version));
    }
    let unknown: BTreeSet<String> = record
        .layouts
        .block_ids()
        .into_iter()
        .chain(record.hidden_blocks.iter().map(String::as_str))
        .filter(|id| !page.contains(id))
        .map(str::to_string)
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(StoreError::UnknownBlocks {
            page_key: page.key.to_string(),
            ids: unknown.into_iter().collect(),
        })
    }
}

/// Keeps the allowed, non-overlapping part of `record`.
fn normalize(page_key: &str, record: &LayoutRecord, allowed: &HashSet<String>) -> LayoutRecord {
    let mut layouts = LayoutSet::new();
    for bp in Breakpoint::ALL {
        let mut kept: Vec<LayoutItem> = Vec::new();
        for raw in record.layouts.get(bp).unwrap_or(&[]) {
            if !allowed.contains(&raw.id) || kept.iter().any(|item| item.id == raw.id) {
                continue;
            }
            let Some(clamped) = clamp_item(raw, bp.columns()) else {
                debug!(breakpoint = %bp, block = %raw.id, "dropping non-finite item");
                continue;
            };
            if kept.iter().any(|item| item.overlaps(&clamped.item)) {
                debug!(breakpoint = %bp, block = %raw.id, "dropping overlapping item");
                continue;
            }
            kept.push(clamped.item);
        }
        layouts.set(bp, kept);
    }

    let hidden: HiddenBlockSet = record
        .hidden_blocks
        .iter()
        .filter(|id| allowed.contains(id.as_str()))
        .cloned()
        .collect();
    LayoutRecord::new(page_key, &layouts, &hidden)
}

#[async_trait]
impl LayoutStore for InMemoryLayoutStore {
    async fn fetch(&self, page_key: &str) -> Result<Option<LayoutRecord>, StoreError> {
        self.check_online()?;
        let page = lookup_page(page_key)?;
        let records = self.records.lock().await;
        // Permissions may have changed since the record was written.
        Ok(records
            .get(&self.key(page_key))
            .map(|record| normalize(page.key, record, &self.allowed_ids(page))))
    }

    async fn save(&self, record: LayoutRecord) -> Result<LayoutRecord, StoreError> {
        self.check_online()?;
        let page = lookup_page(&record.page_key)?;
        validate(page, &record)?;

        let stored = normalize(page.key, &record, &self.allowed_ids(page));
        self.records
            .lock()
            .await
            .insert(self.key(page.key), stored.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        debug!(user = %self.user.username, page = page.key, "layout stored");
        Ok(stored)
    }

    async fn reset(&self, page_key: &str) -> Result<Option<LayoutRecord>, StoreError> {
        self.check_online()?;
        lookup_page(page_key)?;
        self.records.lock().await.remove(&self.key(page_key));
        Ok(None)
    }
}
