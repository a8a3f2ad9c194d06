//! Grid geometry: layout items, per-breakpoint layout sets, and hidden-block sets.
//!
//! Two shapes exist for a block's position:
//!
//! - [`RawLayoutItem`] is what arrives from outside (the drag/resize widget,
//!   the layout resource, the local cache).  Its coordinates are `f64` so that
//!   negative, fractional, or non-finite values can be represented and then
//!   rejected or repaired.
//! - [`LayoutItem`] is the trusted shape produced by the sanitizer.  Its
//!   coordinates are unsigned integer grid units.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::breakpoint::Breakpoint;

/// Minimum height of a block, in grid rows.
pub const MIN_HEIGHT: u32 = 1;

/// Default geometry supplied by a page for one block at one breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl GridRect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// A sanitized block position for one breakpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayoutItem {
    /// Block id.  Serialized as `i` to match the grid widget's item shape.
    #[serde(rename = "i")]
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl LayoutItem {
    pub fn new(id: impl Into<String>, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w,
            h,
        }
    }

    /// Returns the rightmost column (exclusive).
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.w)
    }

    /// Returns the bottommost row (exclusive).
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.h)
    }

    /// Returns `true` if the two rectangles share any cell.
    ///
    /// Edges are half-open, so items that merely touch do not overlap.
    pub fn overlaps(&self, other: &LayoutItem) -> bool {
        u64::from(self.x) < other.right()
            && self.right() > u64::from(other.x)
            && u64::from(self.y) < other.bottom()
            && self.bottom() > u64::from(other.y)
    }
}

/// An untrusted block position, as received from the widget or from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLayoutItem {
    #[serde(rename = "i")]
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl RawLayoutItem {
    pub fn new(id: impl Into<String>, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w,
            h,
        }
    }

    /// Returns `true` when every coordinate is a finite number.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

impl From<&LayoutItem> for RawLayoutItem {
    fn from(item: &LayoutItem) -> Self {
        Self {
            id: item.id.clone(),
            x: f64::from(item.x),
            y: f64::from(item.y),
            w: f64::from(item.w),
            h: f64::from(item.h),
        }
    }
}

/// A sanitized arrangement: one ordered item list per breakpoint.
///
/// Every breakpoint key is always present, possibly with an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LayoutSet(BTreeMap<Breakpoint, Vec<LayoutItem>>);

impl LayoutSet {
    /// Creates a set with an empty list for every breakpoint.
    pub fn new() -> Self {
        Self(Breakpoint::ALL.into_iter().map(|bp| (bp, Vec::new())).collect())
    }

    /// Returns the items for `breakpoint`.
    pub fn get(&self, breakpoint: Breakpoint) -> &[LayoutItem] {
        self.0.get(&breakpoint).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replaces the items for `breakpoint`.
    pub fn set(&mut self, breakpoint: Breakpoint, items: Vec<LayoutItem>) {
        self.0.insert(breakpoint, items);
    }

    /// Finds the item for `id` at `breakpoint`.
    pub fn item(&self, breakpoint: Breakpoint, id: &str) -> Option<&LayoutItem> {
        self.get(breakpoint).iter().find(|item| item.id == id)
    }

    /// Returns `true` if both sets place the same blocks in the same cells at
    /// every breakpoint.  Item order within a breakpoint is ignored.
    pub fn same_arrangement(&self, other: &LayoutSet) -> bool {
        Breakpoint::ALL.into_iter().all(|bp| {
            let (mine, theirs) = (self.get(bp), other.get(bp));
            mine.len() == theirs.len()
                && mine
                    .iter()
                    .all(|item| other.item(bp, &item.id) == Some(item))
        })
    }

    /// Iterates breakpoints in canonical order with their items.
    pub fn iter(&self) -> impl Iterator<Item = (Breakpoint, &[LayoutItem])> {
        self.0.iter().map(|(bp, items)| (*bp, items.as_slice()))
    }

    /// Converts back to the untrusted shape, e.g. to send it to storage.
    pub fn to_raw(&self) -> RawLayoutSet {
        let mut raw = RawLayoutSet::default();
        for (bp, items) in self.iter() {
            raw.insert(bp, items.iter().map(RawLayoutItem::from).collect());
        }
        raw
    }
}

impl Default for LayoutSet {
    fn default() -> Self {
        Self::new()
    }
}

/// An untrusted arrangement keyed by breakpoint wire key.
///
/// Keys are kept as strings so that records written for a breakpoint this
/// build does not know about still deserialize; such keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawLayoutSet(BTreeMap<String, Vec<RawLayoutItem>>);

impl RawLayoutSet {
    /// Returns the items stored under `breakpoint`, if any.
    pub fn get(&self, breakpoint: Breakpoint) -> Option<&[RawLayoutItem]> {
        self.0.get(breakpoint.key()).map(Vec::as_slice)
    }

    pub fn insert(&mut self, breakpoint: Breakpoint, items: Vec<RawLayoutItem>) {
        self.0.insert(breakpoint.key().to_string(), items);
    }

    /// Every block id mentioned at any breakpoint, known or not.
    pub fn block_ids(&self) -> BTreeSet<&str> {
        self.0
            .values()
            .flatten()
            .map(|item| item.id.as_str())
            .collect()
    }

    /// Keys that do not name a known breakpoint.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|key| key.parse::<Breakpoint>().is_err())
    }
}

/// Ids of the blocks that are currently not rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HiddenBlockSet(BTreeSet<String>);

impl HiddenBlockSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    /// Adds `id`; returns `false` if it was already hidden.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.0.insert(id.into())
    }

    /// Removes `id`; returns `false` if it was not hidden.
    pub fn remove(&mut self, id: &str) -> bool {
        self.0.remove(id)
    }

    pub fn retain(&mut self, keep: impl FnMut(&String) -> bool) {
        self.0.retain(keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted id list, as sent to storage.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for HiddenBlockSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
