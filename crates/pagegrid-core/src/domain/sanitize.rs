//! Layout sanitizer: validates and repairs one breakpoint's candidate items.
//!
//! The sanitizer never tries to be clever about overlaps.  It returns both a
//! (possibly repaired) item list and a validity flag, and callers never keep
//! a flagged result: they substitute the breakpoint's default arrangement via
//! [`sanitize_or_fallback`].  Partial corruption therefore discards the whole
//! breakpoint rather than producing a half-fixed grid.
//!
//! # Steps
//!
//! 1. Duplicate ids: the first occurrence wins, later ones are dropped.
//! 2. Non-finite coordinates: the item is dropped.
//! 3. `w` is clamped to `[1, columns]`, `h` to `>= MIN_HEIGHT`, `x`/`y` to `>= 0`.
//! 4. An item sticking out of the right edge is shifted left.
//! 5. Any pairwise overlap invalidates the breakpoint.
//!
//! Steps 1, 2, 4 and 5 flag the result invalid.  Clamping in step 3 alone does
//! not, because it only maps out-of-range input onto the nearest valid value.

use std::collections::HashSet;

use tracing::debug;

use super::breakpoint::Breakpoint;
use super::geometry::{LayoutItem, LayoutSet, RawLayoutItem, RawLayoutSet, MIN_HEIGHT};

/// A condition that flagged a breakpoint invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A later item reused an id already seen.
    DuplicateId(String),
    /// The item had a NaN or infinite coordinate.
    NonFinite(String),
    /// The item extended past the last column and was shifted left.
    OutOfBounds { id: String, requested_x: u32, shifted_x: u32 },
    /// Two items share at least one cell.
    Overlap { first: String, second: String },
}

/// Output of [`sanitize_breakpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub items: Vec<LayoutItem>,
    pub valid: bool,
    pub violations: Vec<Violation>,
}

/// Converts an untrusted coordinate to a grid unit, truncating toward zero.
///
/// Negative values map to zero and values above `u32::MAX` saturate.
fn to_grid(value: f64) -> u32 {
    value.trunc().max(0.0) as u32
}

/// Result of [`clamp_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClampedItem {
    pub item: LayoutItem,
    /// The requested `x` when the item had to be shifted left to fit.
    pub shifted_from: Option<u32>,
}

/// Applies steps 3 and 4 to a single item.
///
/// Returns `None` for an item with a non-finite coordinate.
pub fn clamp_item(raw: &RawLayoutItem, columns: u32) -> Option<ClampedItem> {
    if !raw.is_finite() {
        return None;
    }
    let columns = columns.max(1);
    let w = to_grid(raw.w).clamp(1, columns);
    let h = to_grid(raw.h).max(MIN_HEIGHT);
    let x = to_grid(raw.x);
    let y = to_grid(raw.y);

    let (x, shifted_from) = if u64::from(x) + u64::from(w) > u64::from(columns) {
        (columns.saturating_sub(w), Some(x))
    } else {
        (x, None)
    };
    Some(ClampedItem {
        item: LayoutItem::new(raw.id.clone(), x, y, w, h),
        shifted_from,
    })
}

/// Validates and repairs `candidate` for a grid of `columns` columns.
pub fn sanitize_breakpoint(candidate: &[RawLayoutItem], columns: u32) -> Sanitized {
    let mut violations = Vec::new();
    let mut seen: HashSet<&str> = HashSet::with_capacity(candidate.len());
    let mut items: Vec<LayoutItem> = Vec::with_capacity(candidate.len());

    for raw in candidate {
        if !seen.insert(raw.id.as_str()) {
            violations.push(Violation::DuplicateId(raw.id.clone()));
            continue;
        }
        let Some(clamped) = clamp_item(raw, columns) else {
            violations.push(Violation::NonFinite(raw.id.clone()));
            continue;
        };
        if let Some(requested_x) = clamped.shifted_from {
            violations.push(Violation::OutOfBounds {
                id: raw.id.clone(),
                requested_x,
                shifted_x: clamped.item.x,
            });
        }
        items.push(clamped.item);
    }

    for (idx, a) in items.iter().enumerate() {
        for b in &items[idx + 1..] {
            if a.overlaps(b) {
                violations.push(Violation::Overlap {
                    first: a.id.clone(),
                    second: b.id.clone(),
                });
            }
        }
    }

    Sanitized {
        valid: violations.is_empty(),
        items,
        violations,
    }
}

/// Sanitizes `candidate` for `breakpoint`, substituting `fallback[breakpoint]`
/// when the result is invalid.
///
/// Returns the items to keep and whether the fallback was used.
pub fn sanitize_or_fallback(
    breakpoint: Breakpoint,
    candidate: &[RawLayoutItem],
    fallback: &LayoutSet,
) -> (Vec<LayoutItem>, bool) {
    let result = sanitize_breakpoint(candidate, breakpoint.columns());
    if result.valid {
        (result.items, false)
    } else {
        debug!(
            breakpoint = %breakpoint,
            violations = ?result.violations,
            "layout rejected, using default arrangement"
        );
        (fallback.get(breakpoint).to_vec(), true)
    }
}

/// Sanitizes every breakpoint of `candidate` against `fallback`.
///
/// Breakpoints missing from `candidate` take the fallback entry.  Returns the
/// resulting set and the breakpoints that fell back.
pub fn sanitize_set(
    candidate: &RawLayoutSet,
    fallback: &LayoutSet,
) -> (LayoutSet, Vec<Breakpoint>) {
    let mut layout = LayoutSet::new();
    let mut fell_back = Vec::new();
    for bp in Breakpoint::ALL {
        match candidate.get(bp) {
            Some(items) => {
                let (kept, used_fallback) = sanitize_or_fallback(bp, items, fallback);
                if used_fallback {
                    fell_back.push(bp);
                }
                layout.set(bp, kept);
            }
            None => {
                fell_back.push(bp);
                layout.set(bp, fallback.get(bp).to_vec());
            }
        }
    }
    (layout, fell_back)
}
