//! Layout normalizer: the canonical default arrangement for a set of blocks.
//!
//! The output is the fallback whenever no usable persisted data exists, the
//! per-breakpoint substitute for anything the sanitizer rejects, and the target
//! of "reset to defaults".  It is therefore always valid.

use std::collections::HashSet;

use tracing::debug;

use super::block::BlockDescriptor;
use super::breakpoint::Breakpoint;
use super::geometry::{GridRect, LayoutItem, LayoutSet, RawLayoutItem, MIN_HEIGHT};
use super::sanitize::sanitize_breakpoint;

/// Height given to a block that has no default geometry.
pub const DEFAULT_BLOCK_HEIGHT: u32 = 8;

/// Vertical step between synthesized blocks, per preceding block.
pub const SYNTHESIZED_ROW_STEP: u32 = 2;

/// Geometry used for a block without a default at `breakpoint`.
pub fn synthesized_rect(breakpoint: Breakpoint, index: usize) -> GridRect {
    let index = u32::try_from(index).unwrap_or(u32::MAX);
    GridRect::new(
        0,
        index.saturating_mul(SYNTHESIZED_ROW_STEP),
        breakpoint.columns(),
        DEFAULT_BLOCK_HEIGHT,
    )
}

/// Builds the default [`LayoutSet`] for `allowed` blocks (catalog order).
///
/// Catalog geometry wins where present; the rest is synthesized.  The result
/// goes through the sanitizer like any saved layout.  A breakpoint the
/// sanitizer rejects is rebuilt as a full-width vertical stack, which cannot
/// overlap.
pub fn normalize_defaults(allowed: &[&BlockDescriptor]) -> LayoutSet {
    let mut layout = LayoutSet::new();
    for bp in Breakpoint::ALL {
        let candidate: Vec<RawLayoutItem> = allowed
            .iter()
            .enumerate()
            .map(|(index, block)| {
                let rect = block
                    .defaults
                    .get(&bp)
                    .copied()
                    .unwrap_or_else(|| synthesized_rect(bp, index));
                RawLayoutItem::new(
                    block.id.clone(),
                    f64::from(rect.x),
                    f64::from(rect.y),
                    f64::from(rect.w),
                    f64::from(rect.h),
                )
            })
            .collect();

        let result = sanitize_breakpoint(&candidate, bp.columns());
        let items = if result.valid {
            result.items
        } else {
            debug!(
                breakpoint = %bp,
                violations = ?result.violations,
                "default geometry invalid, stacking blocks"
            );
            stacked(allowed, bp)
        };
        layout.set(bp, items);
    }
    layout
}

/// Full-width blocks stacked top to bottom, keeping each block's default height.
fn stacked(allowed: &[&BlockDescriptor], breakpoint: Breakpoint) -> Vec<LayoutItem> {
    let mut seen = HashSet::new();
    let mut y = 0u32;
    let mut items = Vec::with_capacity(allowed.len());
    for block in allowed {
        if !seen.insert(block.id.as_str()) {
            continue;
        }
        let h = block
            .defaults
            .get(&breakpoint)
            .map_or(DEFAULT_BLOCK_HEIGHT, |rect| rect.h)
            .max(MIN_HEIGHT);
        items.push(LayoutItem::new(block.id.clone(), 0, y, breakpoint.columns(), h));
        y = y.saturating_add(h);
    }
    items
}
