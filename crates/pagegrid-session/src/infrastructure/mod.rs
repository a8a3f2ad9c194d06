//! Infrastructure layer for customizable pages.
//!
//! Contains the adapters behind the application ports: the layout resource
//! (emulated in memory with the server's normalization rules), the local
//! fallback caches, the injectable UI state container, and the TOML
//! configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pagegrid_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod cache;
pub mod config;
pub mod store;
pub mod ui_store;
