//! Layout and hidden-block mergers.
//!
//! Persisted state is reconciled against what the page can show *now*: blocks
//! the user lost access to disappear, blocks added to the catalog since the
//! last save show up at their default position, and required blocks are always
//! visible.  Saved values win for every id they cover.

use std::collections::HashSet;

use tracing::debug;

use super::block::BlockDescriptor;
use super::breakpoint::Breakpoint;
use super::geometry::{HiddenBlockSet, LayoutItem, LayoutSet, RawLayoutItem, RawLayoutSet};
use super::normalize::DEFAULT_BLOCK_HEIGHT;
use super::sanitize::{sanitize_breakpoint, sanitize_or_fallback};

/// Merges a saved layout into `defaults` for the `allowed` blocks.
///
/// `defaults` must be the normalizer output for the same `allowed` list.
/// With no saved layout the defaults are returned as they are.  Otherwise,
/// per breakpoint:
///
/// - saved items for ids that are no longer allowed are dropped;
/// - allowed ids the saved layout does not mention get their default item,
///   or are placed below everything when the default would collide;
/// - a breakpoint that still fails sanitization takes `defaults[bp]`.
///
/// Unknown breakpoint keys in `saved` are ignored.
pub fn merge_layouts(
    defaults: &LayoutSet,
    saved: Option<&RawLayoutSet>,
    allowed: &[&BlockDescriptor],
) -> LayoutSet {
    let Some(saved) = saved else {
        return defaults.clone();
    };

    for key in saved.unknown_keys() {
        debug!(key, "ignoring unknown breakpoint in saved layout");
    }

    let allowed_ids: HashSet<&str> = allowed.iter().map(|b| b.id.as_str()).collect();
    let mut merged = LayoutSet::new();
    for bp in Breakpoint::ALL {
        let kept: Vec<RawLayoutItem> = saved
            .get(bp)
            .unwrap_or(&[])
            .iter()
            .filter(|item| allowed_ids.contains(item.id.as_str()))
            .cloned()
            .collect();

        let base = sanitize_breakpoint(&kept, bp.columns());
        if !base.valid {
            debug!(
                breakpoint = %bp,
                violations = ?base.violations,
                "saved layout rejected, using default arrangement"
            );
            merged.set(bp, defaults.get(bp).to_vec());
            continue;
        }

        let mut items = base.items;
        fill_missing(bp, &mut items, allowed, defaults);

        let candidate: Vec<RawLayoutItem> = items.iter().map(RawLayoutItem::from).collect();
        let (items, _) = sanitize_or_fallback(bp, &candidate, defaults);
        merged.set(bp, items);
    }
    merged
}

/// Appends an item for every `allowed` block that `items` does not cover.
///
/// The block's item in `reference` is reused when it does not collide with
/// what is already there.  Otherwise the block goes below every existing item
/// at `x = 0`, keeping the reference size (or the full width and the default
/// height when `reference` has no item for it).
///
/// `items` must already be valid for `bp`; the result then is too.
pub fn fill_missing(
    bp: Breakpoint,
    items: &mut Vec<LayoutItem>,
    allowed: &[&BlockDescriptor],
    reference: &LayoutSet,
) {
    for block in allowed {
        if items.iter().any(|item| item.id == block.id) {
            continue;
        }
        let item = place_missing(bp, block, reference, items);
        items.push(item);
    }
}

fn place_missing(
    bp: Breakpoint,
    block: &BlockDescriptor,
    reference: &LayoutSet,
    existing: &[LayoutItem],
) -> LayoutItem {
    let previous = reference.item(bp, &block.id);
    if let Some(previous) = previous {
        if !existing.iter().any(|other| other.overlaps(previous)) {
            return previous.clone();
        }
    }

    let (w, h) = previous.map_or((bp.columns(), DEFAULT_BLOCK_HEIGHT), |p| (p.w, p.h));
    let bottom = existing.iter().map(LayoutItem::bottom).max().unwrap_or(0);
    let y = u32::try_from(bottom).unwrap_or(u32::MAX);
    debug!(breakpoint = %bp, block = %block.id, y, "placing block below layout");
    LayoutItem::new(block.id.clone(), 0, y, w, h)
}

/// The hidden set a catalog starts with: default-hidden, non-required blocks.
pub fn default_hidden(catalog: &[&BlockDescriptor]) -> HiddenBlockSet {
    catalog
        .iter()
        .filter(|b| b.default_hidden && !b.required)
        .map(|b| b.id.clone())
        .collect()
}

/// Merges a saved hidden-id list with the `catalog` of allowed blocks.
///
/// Without saved ids the catalog's default hidden set is used.  Required ids
/// and ids outside `catalog` are always removed.
pub fn merge_hidden(catalog: &[&BlockDescriptor], saved: Option<&[String]>) -> HiddenBlockSet {
    let mut hidden = match saved {
        Some(ids) => ids.iter().cloned().collect(),
        None => default_hidden(catalog),
    };
    hidden.retain(|id| {
        catalog
            .iter()
            .any(|block| block.id == *id && !block.required)
    });
    hidden
}
