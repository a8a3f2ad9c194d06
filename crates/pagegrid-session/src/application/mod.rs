//! Application layer use cases for customizable pages.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure business rules in `pagegrid-core`) and the infrastructure (storage,
//! caches, configuration).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain functions to fulfil a user goal (e.g., "let the
//!   user rearrange this page and keep the result").
//! - **Depend on abstractions** (traits in [`ports`]) rather than concrete
//!   implementations, so the layout resource or the cache can be swapped
//!   without changing this code.
//! - **Contain no network I/O and no file system access**.
//!
//! # Sub-modules
//!
//! - **`ports`**        – Traits the session talks to: the persisted layout
//!   resource, the local fallback cache, and the drag/resize grid widget.
//!
//! - **`edit_session`** – The viewing/editing state machine of one page for
//!   one user: load, edit, hide, save, cancel, reset.
//!
//! - **`autosave`**     – The debounce deadline that turns a burst of edits
//!   into a single save.
//!
//! - **`runner`**       – A tokio task that owns one session, serializes every
//!   command sent to it, and fires the auto-save when the deadline elapses.

pub mod autosave;
pub mod edit_session;
pub mod ports;
pub mod runner;
