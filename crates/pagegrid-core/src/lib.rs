//! # pagegrid-core
//!
//! Shared library for per-page customizable grids containing the block
//! catalog model, the layout reconciliation rules, and the wire records used
//! to persist a user's arrangement.
//!
//! It has zero dependencies on network sockets, async runtimes, or UI widgets.
//!
//! # Architecture overview (for beginners)
//!
//! A customizable page is made of *blocks* (a table, a form, a chart...).
//! Every user can move, resize, and hide those blocks independently for each
//! responsive *breakpoint* (large, medium, small, extra-small screens).  The
//! arrangement is stored on the server and must always stay geometrically
//! valid: no two blocks overlap and every block stays inside the grid.
//!
//! This crate (`pagegrid-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure business logic: which blocks a user may see, what the
//!   default arrangement looks like, how an untrusted arrangement is repaired,
//!   and how a saved arrangement is reconciled with the current catalog.
//!
//! - **`catalog`** – The registry of known pages and the blocks each of them
//!   exposes, with the permission each block requires.
//!
//! - **`protocol`** – How an arrangement travels to storage: the versioned JSON
//!   record exchanged with the layout resource and the local cache entry.

pub mod catalog;
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `pagegrid_core::LayoutSet` instead of `pagegrid_core::domain::geometry::LayoutSet`.
pub use domain::block::{Action, BlockDescriptor, BlockRenderer, PermissionRequirement};
pub use domain::breakpoint::Breakpoint;
pub use domain::geometry::{
    GridRect, HiddenBlockSet, LayoutItem, LayoutSet, RawLayoutItem, RawLayoutSet, MIN_HEIGHT,
};
pub use domain::merge::{default_hidden, fill_missing, merge_hidden, merge_layouts};
pub use domain::normalize::normalize_defaults;
pub use domain::page::{PageCatalog, ResolvedPage};
pub use domain::permission::{
    can_edit_page, filter_allowed_blocks, is_allowed, AccessChecker, ModulePermission,
    ModulePermissions, Role, UserContext,
};
pub use domain::sanitize::{
    clamp_item, sanitize_breakpoint, sanitize_or_fallback, sanitize_set, ClampedItem, Sanitized,
    Violation,
};
pub use protocol::{resource_path, CacheEntry, CodecError, LayoutRecord, LAYOUT_SCHEMA_VERSION};
