//! EditSession: the viewing/editing state machine of one page for one user.
//!
//! # State
//!
//! ```text
//!            begin_edit (can_edit)
//!   Viewing ───────────────────────► Editing ──┐ apply_items / toggle_hidden
//!      ▲                                │  ▲   │ (re-arm auto-save when dirty)
//!      │  save (ok or unchanged)        │  └───┘
//!      └────────────────────────────────┤
//!      │  cancel                        │ reset (stays Editing)
//!      └────────────────────────────────┘
//! ```
//!
//! The session keeps two copies of the page state: `saved`/`hidden` (last
//! exchanged with storage) and `active`/`hidden_active` (what the user sees
//! and edits).  While viewing the two are equal.  `dirty` is not stored; it is
//! derived by comparing them.
//!
//! # Read path
//!
//! [`EditSession::seed_from_cache`] pre-seeds from the local cache, best
//! effort.  [`EditSession::load`] then fetches the authoritative record and
//! overwrites both the state and the cache.
//!
//! # Failure semantics
//!
//! Save and reset failures are logged and reported through [`SaveOutcome`] /
//! [`ResetOutcome`]; they never discard local state.  Invalid geometry is
//! repaired silently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use pagegrid_core::{
    fill_missing, protocol::cache_key, sanitize_or_fallback, BlockDescriptor, Breakpoint,
    CacheEntry, HiddenBlockSet, LayoutItem, LayoutRecord, LayoutSet, RawLayoutItem, ResolvedPage,
};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::autosave::AutoSaveTimer;
use crate::application::ports::{GridWidget, LayoutCache, LayoutStore, StoreError};

/// Identifies one session in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Viewing,
    Editing,
}

/// Error type for edit-session commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("user may not customize page {0}")]
    EditForbidden(String),

    #[error("session is not in editing mode")]
    NotEditing,

    #[error("block {0} is required and cannot be hidden")]
    RequiredBlock(String),

    #[error("block {0} is not available on this page")]
    UnknownBlock(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The runner task owning the session is gone.
    #[error("session task has stopped")]
    Closed,
}

/// Result of a save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The store accepted the layout.
    Saved,
    /// Nothing to save; no request was made.
    Unchanged,
    /// The store rejected the request or could not be reached.  Edits are kept.
    Failed(StoreError),
}

/// Result of a reset attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    /// The server was not reset; the local defaults are kept.
    Failed(StoreError),
}

/// One visible block with the cell it occupies.
#[derive(Debug, Clone, Copy)]
pub struct PlannedBlock<'a> {
    pub block: &'a BlockDescriptor,
    pub item: &'a LayoutItem,
}

impl PlannedBlock<'_> {
    /// Calls the block's renderer for its cell.
    pub fn render(&self) -> Option<String> {
        self.block.render(self.item)
    }
}

/// Owned copy of a session's state, as returned by the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub page_key: String,
    pub mode: SessionMode,
    pub dirty: bool,
    pub saved: LayoutSet,
    pub hidden: HiddenBlockSet,
    pub active: LayoutSet,
    pub hidden_active: HiddenBlockSet,
}

struct CacheSlot {
    cache: Arc<dyn LayoutCache>,
    key: String,
}

pub struct EditSession {
    id: SessionId,
    page: ResolvedPage,
    store: Arc<dyn LayoutStore>,
    cache: Option<CacheSlot>,
    widget: Option<Arc<dyn GridWidget>>,
    mode: SessionMode,
    saved: LayoutSet,
    hidden: HiddenBlockSet,
    active: LayoutSet,
    hidden_active: HiddenBlockSet,
    timer: AutoSaveTimer,
}

impl EditSession {
    /// Creates a viewing session showing the page defaults.
    pub fn new(page: ResolvedPage, store: Arc<dyn LayoutStore>) -> Self {
        let saved = page.defaults.clone();
        let hidden = page.default_hidden.clone();
        Self {
            id: SessionId::new(),
            active: saved.clone(),
            hidden_active: hidden.clone(),
            saved,
            hidden,
            page,
            store,
            cache: None,
            widget: None,
            mode: SessionMode::Viewing,
            timer: AutoSaveTimer::default(),
        }
    }

    /// Attaches the local fallback cache, keyed under `namespace`.
    pub fn with_cache(mut self, cache: Arc<dyn LayoutCache>, namespace: &str) -> Self {
        let key = cache_key(namespace, &self.page.key);
        self.cache = Some(CacheSlot { cache, key });
        self
    }

    pub fn with_widget(mut self, widget: Arc<dyn GridWidget>) -> Self {
        self.widget = Some(widget);
        self
    }

    pub fn with_autosave_delay(mut self, delay: Duration) -> Self {
        self.timer = AutoSaveTimer::new(delay);
        self
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn page_key(&self) -> &str {
        &self.page.key
    }

    pub fn page(&self) -> &ResolvedPage {
        &self.page
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn can_edit(&self) -> bool {
        self.page.can_edit
    }

    /// Returns `true` if the active state differs from the last persisted one.
    ///
    /// Item order within a breakpoint does not count as a change.
    pub fn is_dirty(&self) -> bool {
        !self.active.same_arrangement(&self.saved) || self.hidden_active != self.hidden
    }

    pub fn saved(&self) -> &LayoutSet {
        &self.saved
    }

    pub fn hidden(&self) -> &HiddenBlockSet {
        &self.hidden
    }

    pub fn active(&self) -> &LayoutSet {
        &self.active
    }

    pub fn hidden_active(&self) -> &HiddenBlockSet {
        &self.hidden_active
    }

    /// When the pending auto-save fires, if one is armed.
    pub fn autosave_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Visible blocks at `breakpoint` with their cells, top to bottom then
    /// left to right.
    pub fn render_plan(&self, breakpoint: Breakpoint) -> Vec<PlannedBlock<'_>> {
        let mut plan: Vec<PlannedBlock<'_>> = self
            .active
            .get(breakpoint)
            .iter()
            .filter(|item| !self.hidden_active.contains(&item.id))
            .filter_map(|item| self.page.block(&item.id).map(|block| PlannedBlock { block, item }))
            .collect();
        plan.sort_by_key(|planned| (planned.item.y, planned.item.x));
        plan
    }

    /// The items the grid widget should display at `breakpoint`.
    pub fn widget_items(&self, breakpoint: Breakpoint) -> Vec<LayoutItem> {
        self.active
            .get(breakpoint)
            .iter()
            .filter(|item| !self.hidden_active.contains(&item.id))
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            page_key: self.page.key.clone(),
            mode: self.mode,
            dirty: self.is_dirty(),
            saved: self.saved.clone(),
            hidden: self.hidden.clone(),
            active: self.active.clone(),
            hidden_active: self.hidden_active.clone(),
        }
    }

    // ── Read path ─────────────────────────────────────────────────────────────

    /// Pre-seeds state from the local cache.
    ///
    /// Returns `true` if a cached entry was applied.  Cache failures are
    /// logged at debug level and treated as a miss.
    pub fn seed_from_cache(&mut self) -> bool {
        let result = match &self.cache {
            Some(slot) => slot.cache.read(&slot.key),
            None => return false,
        };
        match result {
            Ok(Some(entry)) => {
                let (layouts, hidden) =
                    self.page.merge(Some(&entry.layouts), Some(&entry.hidden_blocks));
                self.adopt_saved(layouts, hidden);
                debug!(session = %self.id, page = %self.page.key, "seeded layout from cache");
                true
            }
            Ok(None) => {
                debug!(session = %self.id, page = %self.page.key, "no cached layout");
                false
            }
            Err(e) => {
                debug!(session = %self.id, page = %self.page.key, error = %e, "cache read failed");
                false
            }
        }
    }

    /// Fetches the persisted record and reconciles it with the page.
    ///
    /// Returns `Ok(true)` if a record was found and `Ok(false)` if the page
    /// falls back to its defaults.  While editing only `saved` is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] for any failure other than "not found".
    pub async fn load(&mut self) -> Result<bool, SessionError> {
        match self.store.fetch(&self.page.key).await {
            Ok(Some(record)) => {
                let (layouts, hidden) =
                    self.page.merge(Some(&record.layouts), Some(&record.hidden_blocks));
                self.adopt_saved(layouts, hidden);
                self.write_cache();
                info!(session = %self.id, page = %self.page.key, "loaded saved layout");
                Ok(true)
            }
            Ok(None) => {
                self.adopt_saved(self.page.defaults.clone(), self.page.default_hidden.clone());
                self.remove_cache();
                debug!(session = %self.id, page = %self.page.key, "no saved layout, using defaults");
                Ok(false)
            }
            Err(e) => {
                warn!(session = %self.id, page = %self.page.key, error = %e, "loading layout failed");
                Err(e.into())
            }
        }
    }

    // ── Editing ───────────────────────────────────────────────────────────────

    /// Enters editing mode.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EditForbidden`] if the user may not customize
    /// the page.
    pub fn begin_edit(&mut self) -> Result<(), SessionError> {
        if !self.page.can_edit {
            return Err(SessionError::EditForbidden(self.page.key.clone()));
        }
        if self.mode == SessionMode::Editing {
            return Ok(());
        }
        self.active = self.saved.clone();
        self.hidden_active = self.hidden.clone();
        self.mode = SessionMode::Editing;
        info!(session = %self.id, page = %self.page.key, "editing started");
        Ok(())
    }

    /// Applies the widget's items for `breakpoint`.
    ///
    /// Hidden and unknown ids in `items` are ignored; hidden blocks keep their
    /// geometry.  Returns `true` if the items were invalid and the breakpoint
    /// was replaced by its default arrangement (the widget is then updated).
    pub fn apply_items(
        &mut self,
        breakpoint: Breakpoint,
        items: Vec<RawLayoutItem>,
    ) -> Result<bool, SessionError> {
        self.require_editing()?;

        let visible: Vec<RawLayoutItem> = items
            .into_iter()
            .filter(|item| {
                self.page.block(&item.id).is_some() && !self.hidden_active.contains(&item.id)
            })
            .collect();
        let (mut next, fell_back) = sanitize_or_fallback(breakpoint, &visible, &self.page.defaults);
        if !fell_back {
            let allowed = self.page.allowed_refs();
            fill_missing(breakpoint, &mut next, &allowed, &self.active);
        }
        self.active.set(breakpoint, next);

        if fell_back {
            self.push_widget(breakpoint);
        }
        self.touch();
        Ok(fell_back)
    }

    /// Shows or hides a block.  Returns `true` if the block is now hidden.
    pub fn toggle_hidden(&mut self, block_id: &str) -> Result<bool, SessionError> {
        self.require_editing()?;
        let block = self
            .page
            .block(block_id)
            .ok_or_else(|| SessionError::UnknownBlock(block_id.to_string()))?;
        if block.required {
            return Err(SessionError::RequiredBlock(block_id.to_string()));
        }

        let now_hidden = if self.hidden_active.remove(block_id) {
            false
        } else {
            self.hidden_active.insert(block_id);
            true
        };
        self.push_widget_all();
        self.touch();
        Ok(now_hidden)
    }

    /// Persists the active state and returns to viewing.
    ///
    /// On failure the session stays in editing mode with its edits.
    pub async fn save(&mut self) -> Result<SaveOutcome, SessionError> {
        self.require_editing()?;
        if !self.is_dirty() {
            self.timer.disarm();
            self.mode = SessionMode::Viewing;
            info!(session = %self.id, page = %self.page.key, "editing finished, nothing to save");
            return Ok(SaveOutcome::Unchanged);
        }
        match self.persist().await {
            Ok(()) => {
                self.mode = SessionMode::Viewing;
                info!(session = %self.id, page = %self.page.key, "layout saved");
                Ok(SaveOutcome::Saved)
            }
            Err(e) => Ok(SaveOutcome::Failed(e)),
        }
    }

    /// Saves the active state without leaving editing mode.
    ///
    /// Called by the runner when the auto-save deadline elapses.
    pub async fn run_autosave(&mut self) -> SaveOutcome {
        self.timer.disarm();
        if self.mode != SessionMode::Editing || !self.is_dirty() {
            return SaveOutcome::Unchanged;
        }
        match self.persist().await {
            Ok(()) => {
                info!(session = %self.id, page = %self.page.key, "layout auto-saved");
                SaveOutcome::Saved
            }
            Err(e) => SaveOutcome::Failed(e),
        }
    }

    /// Discards edits and returns to viewing.  No request is made.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.require_editing()?;
        self.active = self.saved.clone();
        self.hidden_active = self.hidden.clone();
        self.mode = SessionMode::Viewing;
        self.timer.disarm();
        self.push_widget_all();
        info!(session = %self.id, page = %self.page.key, "editing cancelled");
        Ok(())
    }

    /// Restores the default arrangement and clears the persisted record.
    ///
    /// If the server cannot be reset the local defaults are kept as unsaved
    /// edits.
    pub async fn reset(&mut self) -> Result<ResetOutcome, SessionError> {
        self.require_editing()?;
        self.active = self.page.defaults.clone();
        self.hidden_active = self.page.default_hidden.clone();

        match self.store.reset(&self.page.key).await {
            Ok(remaining) => {
                let (layouts, hidden) = match &remaining {
                    Some(record) => self
                        .page
                        .merge(Some(&record.layouts), Some(&record.hidden_blocks)),
                    None => (self.page.defaults.clone(), self.page.default_hidden.clone()),
                };
                self.saved = layouts.clone();
                self.hidden = hidden.clone();
                self.active = layouts;
                self.hidden_active = hidden;
                if remaining.is_some() {
                    self.write_cache();
                } else {
                    self.remove_cache();
                }
                self.timer.disarm();
                self.push_widget_all();
                info!(session = %self.id, page = %self.page.key, "layout reset to defaults");
                Ok(ResetOutcome::Reset)
            }
            Err(e) => {
                warn!(session = %self.id, page = %self.page.key, error = %e, "resetting layout failed");
                self.push_widget_all();
                self.touch();
                Ok(ResetOutcome::Failed(e))
            }
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn require_editing(&self) -> Result<(), SessionError> {
        match self.mode {
            SessionMode::Editing => Ok(()),
            SessionMode::Viewing => Err(SessionError::NotEditing),
        }
    }

    /// Re-arms the auto-save after a mutation, or disarms it when clean.
    fn touch(&mut self) {
        if self.mode == SessionMode::Editing && self.is_dirty() {
            self.timer.arm(Instant::now());
        } else {
            self.timer.disarm();
        }
    }

    fn adopt_saved(&mut self, layouts: LayoutSet, hidden: HiddenBlockSet) {
        self.saved = layouts;
        self.hidden = hidden;
        if self.mode == SessionMode::Viewing {
            self.active = self.saved.clone();
            self.hidden_active = self.hidden.clone();
            self.push_widget_all();
        }
    }

    /// Sends the active state and seeds both copies from the server response.
    async fn persist(&mut self) -> Result<(), StoreError> {
        self.timer.disarm();
        let record = LayoutRecord::new(self.page.key.clone(), &self.active, &self.hidden_active);
        match self.store.save(record).await {
            Ok(stored) => {
                let (layouts, hidden) =
                    self.page.merge(Some(&stored.layouts), Some(&stored.hidden_blocks));
                let changed =
                    !layouts.same_arrangement(&self.active) || hidden != self.hidden_active;
                self.saved = layouts.clone();
                self.hidden = hidden.clone();
                self.active = layouts;
                self.hidden_active = hidden;
                self.write_cache();
                if changed {
                    debug!(session = %self.id, page = %self.page.key, "server normalized the saved layout");
                    self.push_widget_all();
                }
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, page = %self.page.key, error = %e, "saving layout failed");
                Err(e)
            }
        }
    }

    fn write_cache(&self) {
        let Some(slot) = &self.cache else { return };
        let entry = CacheEntry {
            layouts: self.saved.to_raw(),
            hidden_blocks: self.hidden.to_vec(),
        };
        if let Err(e) = slot.cache.write(&slot.key, &entry) {
            debug!(session = %self.id, key = %slot.key, error = %e, "cache write failed");
        }
    }

    fn remove_cache(&self) {
        let Some(slot) = &self.cache else { return };
        if let Err(e) = slot.cache.remove(&slot.key) {
            debug!(session = %self.id, key = %slot.key, error = %e, "cache remove failed");
        }
    }

    fn push_widget(&self, breakpoint: Breakpoint) {
        if let Some(widget) = &self.widget {
            widget.set_items(breakpoint, &self.widget_items(breakpoint));
        }
    }

    fn push_widget_all(&self) {
        for bp in Breakpoint::ALL {
            self.push_widget(bp);
        }
    }
}

impl fmt::Debug for EditSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditSession")
            .field("id", &self.id)
            .field("page", &self.page.key)
            .field("mode", &self.mode)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pagegrid_core::{
        Action, GridRect, ModulePermissions, PageCatalog, PermissionRequirement, Role, UserContext,
    };
    use tokio_test::{assert_err, assert_ok};

    use crate::application::ports::{CacheError, MockGridWidget};

    // ── Fakes ─────────────────────────────────────────────────────────────────

    /// Echoes saved records back and records every call.
    #[derive(Default)]
    struct RecordingStore {
        record: Mutex<Option<LayoutRecord>>,
        saves: Mutex<Vec<LayoutRecord>>,
        resets: Mutex<usize>,
        offline: AtomicBool,
    }

    impl RecordingStore {
        fn with_record(record: LayoutRecord) -> Self {
            let store = Self::default();
            *store.record.lock().unwrap() = Some(record);
            store
        }

        fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }

        fn last_save(&self) -> Option<LayoutRecord> {
            self.saves.lock().unwrap().last().cloned()
        }

        fn check_online(&self) -> Result<(), StoreError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(StoreError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LayoutStore for RecordingStore {
        async fn fetch(&self, _page_key: &str) -> Result<Option<LayoutRecord>, StoreError> {
            self.check_online()?;
            Ok(self.record.lock().unwrap().clone())
        }

        async fn save(&self, record: LayoutRecord) -> Result<LayoutRecord, StoreError> {
            self.check_online()?;
            self.saves.lock().unwrap().push(record.clone());
            *self.record.lock().unwrap() = Some(record.clone());
            Ok(record)
        }

        async fn reset(&self, _page_key: &str) -> Result<Option<LayoutRecord>, StoreError> {
            self.check_online()?;
            *self.resets.lock().unwrap() += 1;
            *self.record.lock().unwrap() = None;
            Ok(None)
        }
    }

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<String, CacheEntry>>,
    }

    impl LayoutCache for FakeCache {
        fn read(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        fn write(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
            self.entries.lock().unwrap().insert(key.to_string(), entry.clone());
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), CacheError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWidget {
        pushes: Mutex<Vec<(Breakpoint, Vec<LayoutItem>)>>,
    }

    impl GridWidget for RecordingWidget {
        fn set_items(&self, breakpoint: Breakpoint, items: &[LayoutItem]) {
            self.pushes.lock().unwrap().push((breakpoint, items.to_vec()));
        }
    }

    // ── Fixtures ──────────────────────────────────────────────────────────────

    fn catalog() -> PageCatalog {
        PageCatalog::new(
            "module:test",
            vec![
                BlockDescriptor::new("a")
                    .required()
                    .with_default(Breakpoint::Lg, GridRect::new(0, 0, 12, 8)),
                BlockDescriptor::new("b").with_default(Breakpoint::Lg, GridRect::new(0, 8, 12, 4)),
                BlockDescriptor::new("c")
                    .hidden_by_default()
                    .with_default(Breakpoint::Lg, GridRect::new(0, 12, 12, 4)),
            ],
        )
    }

    fn page() -> ResolvedPage {
        catalog().resolve(&UserContext::new("alice", Role::User), &ModulePermissions::new())
    }

    fn session(store: Arc<RecordingStore>) -> EditSession {
        EditSession::new(page(), store)
    }

    fn raw(id: &str, x: f64, y: f64, w: f64, h: f64) -> RawLayoutItem {
        RawLayoutItem::new(id, x, y, w, h)
    }

    // ── Mode transitions ──────────────────────────────────────────────────────

    #[test]
    fn test_new_session_views_defaults_and_is_clean() {
        let session = session(Arc::new(RecordingStore::default()));

        assert_eq!(session.mode(), SessionMode::Viewing);
        assert!(!session.is_dirty());
        assert_eq!(session.active(), &session.page().defaults);
        assert!(session.hidden_active().contains("c"));
    }

    #[test]
    fn test_begin_edit_is_forbidden_without_page_permission() {
        // Arrange
        let page = catalog()
            .with_requirement(PermissionRequirement::module("test", Action::Edit))
            .resolve(&UserContext::new("bob", Role::User), &ModulePermissions::new());
        let mut session = EditSession::new(page, Arc::new(RecordingStore::default()));

        // Act
        let result = session.begin_edit();

        // Assert
        assert_eq!(result, Err(SessionError::EditForbidden("module:test".to_string())));
        assert_eq!(session.mode(), SessionMode::Viewing);
    }

    #[test]
    fn test_mutations_outside_editing_are_rejected() {
        let mut session = session(Arc::new(RecordingStore::default()));

        assert_eq!(session.toggle_hidden("b"), Err(SessionError::NotEditing));
        assert_eq!(
            session.apply_items(Breakpoint::Lg, Vec::new()),
            Err(SessionError::NotEditing)
        );
        assert_eq!(session.cancel(), Err(SessionError::NotEditing));
    }

    // ── Visibility ────────────────────────────────────────────────────────────

    #[test]
    fn test_toggle_then_cancel_restores_visibility_and_clears_dirty() {
        // Arrange
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());
        assert!(!session.is_dirty());

        // Act
        let hidden = assert_ok!(session.toggle_hidden("b"));

        // Assert
        assert!(hidden);
        assert!(session.is_dirty());

        assert_ok!(session.cancel());
        assert!(!session.hidden_active().contains("b"));
        assert!(!session.is_dirty());
        assert_eq!(session.mode(), SessionMode::Viewing);
    }

    #[test]
    fn test_toggle_required_block_is_rejected() {
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());

        assert_eq!(
            session.toggle_hidden("a"),
            Err(SessionError::RequiredBlock("a".to_string()))
        );
        assert!(!session.hidden_active().contains("a"));
    }

    #[test]
    fn test_toggle_unknown_block_is_rejected() {
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());

        let err = assert_err!(session.toggle_hidden("nope"));
        assert_eq!(err, SessionError::UnknownBlock("nope".to_string()));
    }

    #[test]
    fn test_toggle_twice_shows_block_again_and_is_clean() {
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());

        assert_eq!(session.toggle_hidden("c"), Ok(false));
        assert_eq!(session.toggle_hidden("c"), Ok(true));
        assert!(!session.is_dirty());
        assert!(session.autosave_deadline().is_none());
    }

    // ── Widget changes ────────────────────────────────────────────────────────

    #[test]
    fn test_apply_items_replaces_breakpoint_and_keeps_hidden_geometry() {
        // Arrange
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());

        // Act: the widget only knows the visible blocks a and b.
        let fell_back = assert_ok!(session.apply_items(
            Breakpoint::Lg,
            vec![raw("a", 0.0, 0.0, 6.0, 8.0), raw("b", 6.0, 0.0, 6.0, 8.0)],
        ));

        // Assert
        assert!(!fell_back);
        assert_eq!(
            session.active().get(Breakpoint::Lg),
            &[
                LayoutItem::new("a", 0, 0, 6, 8),
                LayoutItem::new("b", 6, 0, 6, 8),
                LayoutItem::new("c", 0, 12, 12, 4),
            ]
        );
        assert!(session.is_dirty());
    }

    #[test]
    fn test_apply_overlapping_items_falls_back_and_updates_widget() {
        // Arrange
        let mut widget = MockGridWidget::new();
        widget
            .expect_set_items()
            .withf(|bp, items| *bp == Breakpoint::Lg && items.len() == 2)
            .times(1)
            .return_const(());
        let mut session = session(Arc::new(RecordingStore::default())).with_widget(Arc::new(widget));
        assert_ok!(session.begin_edit());

        // Act
        let fell_back = assert_ok!(session.apply_items(
            Breakpoint::Lg,
            vec![raw("a", 0.0, 0.0, 12.0, 8.0), raw("b", 0.0, 0.0, 12.0, 4.0)],
        ));

        // Assert
        assert!(fell_back);
        assert_eq!(
            session.active().get(Breakpoint::Lg),
            session.page().defaults.get(Breakpoint::Lg)
        );
    }

    #[test]
    fn test_cancel_pushes_saved_items_for_every_breakpoint() {
        let widget = Arc::new(RecordingWidget::default());
        let mut session =
            session(Arc::new(RecordingStore::default())).with_widget(widget.clone());
        session.begin_edit().unwrap();

        session.cancel().unwrap();

        let pushes = widget.pushes.lock().unwrap();
        let breakpoints: Vec<Breakpoint> = pushes.iter().map(|(bp, _)| *bp).collect();
        assert_eq!(breakpoints, Breakpoint::ALL.to_vec());
        // "c" is hidden by default and never reaches the widget.
        assert!(pushes.iter().all(|(_, items)| items.iter().all(|i| i.id != "c")));
    }

    #[test]
    fn test_apply_current_widget_items_leaves_session_clean() {
        // Arrange: "b" sits between two visible blocks and is hidden, so the
        // widget reports only a and c.
        let page = PageCatalog::new(
            "module:test",
            vec![
                BlockDescriptor::new("a").with_default(Breakpoint::Lg, GridRect::new(0, 0, 12, 4)),
                BlockDescriptor::new("b")
                    .hidden_by_default()
                    .with_default(Breakpoint::Lg, GridRect::new(0, 4, 12, 4)),
                BlockDescriptor::new("c").with_default(Breakpoint::Lg, GridRect::new(0, 8, 12, 4)),
            ],
        )
        .resolve(&UserContext::new("alice", Role::User), &ModulePermissions::new());
        let mut session = EditSession::new(page, Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());
        let reported: Vec<RawLayoutItem> = session
            .widget_items(Breakpoint::Lg)
            .iter()
            .map(RawLayoutItem::from)
            .collect();

        // Act
        assert_ok!(session.apply_items(Breakpoint::Lg, reported));

        // Assert
        assert!(!session.is_dirty());
        assert!(session.autosave_deadline().is_none());
    }

    #[test]
    fn test_apply_same_items_in_another_order_leaves_session_clean() {
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());

        assert_ok!(session.apply_items(
            Breakpoint::Lg,
            vec![raw("b", 0.0, 8.0, 12.0, 4.0), raw("a", 0.0, 0.0, 12.0, 8.0)],
        ));

        assert!(!session.is_dirty());
        assert!(session.autosave_deadline().is_none());
    }

    #[tokio::test]
    async fn test_save_after_reordering_only_makes_no_request() {
        let store = Arc::new(RecordingStore::default());
        let mut session = session(store.clone());
        session.begin_edit().unwrap();
        session
            .apply_items(
                Breakpoint::Lg,
                vec![raw("b", 0.0, 8.0, 12.0, 4.0), raw("a", 0.0, 0.0, 12.0, 8.0)],
            )
            .unwrap();

        assert_eq!(session.save().await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_apply_items_ignores_blocks_outside_the_page() {
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_ok!(session.begin_edit());

        assert_ok!(session.apply_items(
            Breakpoint::Xs,
            vec![raw("ghost", 0.0, 0.0, 4.0, 4.0), raw("a", 0.0, 0.0, 4.0, 8.0)],
        ));

        assert!(session.active().item(Breakpoint::Xs, "ghost").is_none());
        assert!(session.active().item(Breakpoint::Xs, "a").is_some());
    }

    // ── Save ──────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_save_persists_active_state_and_returns_to_viewing() {
        // Arrange
        let store = Arc::new(RecordingStore::default());
        let cache = Arc::new(FakeCache::default());
        let mut session = session(store.clone()).with_cache(cache.clone(), "pagegrid");
        session.begin_edit().unwrap();
        session.toggle_hidden("b").unwrap();

        // Act
        let outcome = session.save().await.unwrap();

        // Assert
        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(session.mode(), SessionMode::Viewing);
        assert!(!session.is_dirty());
        assert_eq!(store.save_count(), 1);
        let sent = store.last_save().unwrap();
        assert_eq!(sent.hidden_blocks, vec!["b".to_string(), "c".to_string()]);
        let cached = cache.read("pagegrid/module:test").unwrap().unwrap();
        assert_eq!(cached.hidden_blocks, sent.hidden_blocks);
    }

    #[tokio::test]
    async fn test_save_without_changes_makes_no_request() {
        let store = Arc::new(RecordingStore::default());
        let mut session = session(store.clone());
        session.begin_edit().unwrap();

        let outcome = session.save().await.unwrap();

        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert_eq!(session.mode(), SessionMode::Viewing);
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_editing_and_dirty() {
        let store = Arc::new(RecordingStore::default());
        store.offline.store(true, Ordering::SeqCst);
        let mut session = session(store.clone());
        session.begin_edit().unwrap();
        session.toggle_hidden("b").unwrap();

        let outcome = session.save().await.unwrap();

        assert!(matches!(outcome, SaveOutcome::Failed(StoreError::Transport(_))));
        assert_eq!(session.mode(), SessionMode::Editing);
        assert!(session.is_dirty());
        assert!(session.hidden_active().contains("b"));
    }

    #[tokio::test]
    async fn test_save_while_viewing_is_rejected() {
        let mut session = session(Arc::new(RecordingStore::default()));
        assert_eq!(session.save().await, Err(SessionError::NotEditing));
    }

    // ── Auto-save ─────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_mutation_arms_autosave_one_delay_later() {
        let mut session = session(Arc::new(RecordingStore::default()))
            .with_autosave_delay(Duration::from_millis(1500));
        session.begin_edit().unwrap();

        let before = Instant::now();
        session.toggle_hidden("b").unwrap();

        assert_eq!(
            session.autosave_deadline(),
            Some(before + Duration::from_millis(1500))
        );
    }

    #[tokio::test]
    async fn test_autosave_saves_but_stays_editing() {
        let store = Arc::new(RecordingStore::default());
        let mut session = session(store.clone());
        session.begin_edit().unwrap();
        session.toggle_hidden("b").unwrap();

        let outcome = session.run_autosave().await;

        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(session.mode(), SessionMode::Editing);
        assert!(!session.is_dirty());
        assert!(session.autosave_deadline().is_none());
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_autosave_when_clean_is_a_no_op() {
        let store = Arc::new(RecordingStore::default());
        let mut session = session(store.clone());
        session.begin_edit().unwrap();

        assert_eq!(session.run_autosave().await, SaveOutcome::Unchanged);
        assert_eq!(store.save_count(), 0);
    }

    // ── Reset ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_reset_restores_defaults_and_clears_cache() {
        // Arrange
        let store = Arc::new(RecordingStore::default());
        let cache = Arc::new(FakeCache::default());
        let mut session = session(store.clone()).with_cache(cache.clone(), "pagegrid");
        session.begin_edit().unwrap();
        session.toggle_hidden("b").unwrap();
        session.save().await.unwrap();
        session.begin_edit().unwrap();

        // Act
        let outcome = session.reset().await.unwrap();

        // Assert
        assert_eq!(outcome, ResetOutcome::Reset);
        assert_eq!(*store.resets.lock().unwrap(), 1);
        assert_eq!(session.saved(), &session.page().defaults);
        assert_eq!(session.hidden(), &session.page().default_hidden);
        assert!(!session.is_dirty());
        assert!(cache.read("pagegrid/module:test").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_local_defaults_as_edits() {
        let store = Arc::new(RecordingStore::default());
        let mut session = session(store.clone());
        session.begin_edit().unwrap();
        session.toggle_hidden("b").unwrap();
        session.save().await.unwrap();
        session.begin_edit().unwrap();
        store.offline.store(true, Ordering::SeqCst);

        let outcome = session.reset().await.unwrap();

        assert!(matches!(outcome, ResetOutcome::Failed(_)));
        assert_eq!(session.hidden_active(), &session.page().default_hidden);
        assert!(session.hidden().contains("b"));
        assert!(session.is_dirty());
    }

    // ── Read path ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_load_without_record_uses_defaults() {
        let mut session = session(Arc::new(RecordingStore::default()));

        let found = session.load().await.unwrap();

        assert!(!found);
        assert_eq!(session.saved(), &session.page().defaults);
    }

    #[tokio::test]
    async fn test_load_merges_record_and_writes_cache() {
        // Arrange
        let mut layouts = page().defaults.clone();
        layouts.set(
            Breakpoint::Lg,
            vec![LayoutItem::new("a", 0, 0, 6, 8), LayoutItem::new("stale", 6, 0, 6, 8)],
        );
        let record = LayoutRecord::new("module:test", &layouts, &["a", "b"].into_iter().collect());
        let store = Arc::new(RecordingStore::with_record(record));
        let cache = Arc::new(FakeCache::default());
        let mut session = session(store).with_cache(cache.clone(), "ns");

        // Act
        let found = session.load().await.unwrap();

        // Assert
        assert!(found);
        assert_eq!(session.active().item(Breakpoint::Lg, "a"), Some(&LayoutItem::new("a", 0, 0, 6, 8)));
        assert!(session.active().item(Breakpoint::Lg, "stale").is_none());
        assert_eq!(session.hidden_active().to_vec(), vec!["b".to_string()]);
        assert!(cache.read("ns/module:test").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_load_error_propagates() {
        let store = Arc::new(RecordingStore::default());
        store.offline.store(true, Ordering::SeqCst);
        let mut session = session(store);

        let err = session.load().await.unwrap_err();

        assert!(matches!(err, SessionError::Store(StoreError::Transport(_))));
    }

    #[tokio::test]
    async fn test_load_while_editing_only_replaces_saved() {
        let record = LayoutRecord::new("module:test", &page().defaults, &HiddenBlockSet::new());
        let store = Arc::new(RecordingStore::with_record(record));
        let mut session = session(store);
        session.begin_edit().unwrap();
        session.toggle_hidden("b").unwrap();

        session.load().await.unwrap();

        assert!(session.hidden_active().contains("b"));
        assert!(!session.hidden().contains("c"));
        assert!(session.is_dirty());
    }

    #[test]
    fn test_seed_from_cache_applies_cached_entry() {
        let cache = Arc::new(FakeCache::default());
        cache
            .write(
                "pagegrid/module:test",
                &CacheEntry {
                    hidden_blocks: vec!["a".to_string(), "b".to_string()],
                    ..CacheEntry::default()
                },
            )
            .unwrap();
        let mut session = session(Arc::new(RecordingStore::default())).with_cache(cache, "pagegrid");

        assert!(session.seed_from_cache());
        // "a" is required, so only "b" stays hidden.
        assert_eq!(session.hidden_active().to_vec(), vec!["b".to_string()]);
    }

    #[test]
    fn test_seed_from_cache_without_cache_is_a_miss() {
        let mut session = session(Arc::new(RecordingStore::default()));
        assert!(!session.seed_from_cache());
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    #[test]
    fn test_render_plan_skips_hidden_blocks_and_orders_by_position() {
        let mut session = session(Arc::new(RecordingStore::default()));
        session.begin_edit().unwrap();
        session
            .apply_items(
                Breakpoint::Lg,
                vec![raw("b", 0.0, 0.0, 12.0, 4.0), raw("a", 0.0, 4.0, 12.0, 8.0)],
            )
            .unwrap();

        let plan = session.render_plan(Breakpoint::Lg);

        let ids: Vec<&str> = plan.iter().map(|p| p.block.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(session.widget_items(Breakpoint::Lg).len(), 2);
    }
}
