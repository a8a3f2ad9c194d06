//! Domain entities for customizable page grids.
//!
//! This module contains pure business logic with no infrastructure dependencies.
//!
//! # What is "domain" in Clean Architecture? (for beginners)
//!
//! Clean Architecture organises code into concentric layers.  The innermost
//! layer is called the **domain** (or "entities" layer).  Domain code:
//!
//! - Contains the core business rules of the application.
//! - Has **no** imports from network libraries, storage drivers, or UI widgets.
//! - Can be compiled and tested on any platform without any external setup.
//!
//! The pipeline the sub-modules implement, leaves first:
//!
//! ```text
//! catalog ──► permission filter ──► normalizer ──┐
//!                                                ├──► merger ──► sanitized LayoutSet
//!                          persisted record ─────┘
//! ```

pub mod block;
pub mod breakpoint;
pub mod geometry;
pub mod merge;
pub mod normalize;
pub mod page;
pub mod permission;
pub mod sanitize;
