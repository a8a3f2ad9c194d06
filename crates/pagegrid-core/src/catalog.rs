//! Built-in page registry.
//!
//! Every customizable page is identified by a stable key (`home`,
//! `module:pharmacy:inventory`, ...) and exposes a fixed set of blocks, each
//! gated by a module permission, by the administrator role, or by nothing at
//! all.  The layout resource rejects block ids that are not registered for the
//! page, and both sides filter blocks the user may not see.

use crate::domain::block::{Action, BlockDescriptor, PermissionRequirement};

/// Permission gate of one registered block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockGate {
    Open,
    Module(&'static str, Action),
    Admin,
}

impl BlockGate {
    pub fn requirement(self) -> Option<PermissionRequirement> {
        match self {
            BlockGate::Open => None,
            BlockGate::Module(module, action) => Some(PermissionRequirement::module(module, action)),
            BlockGate::Admin => Some(PermissionRequirement::AdminOnly),
        }
    }
}

/// One registered page and its blocks, in display order.
#[derive(Debug, Clone, Copy)]
pub struct PageDefinition {
    pub key: &'static str,
    pub blocks: &'static [(&'static str, BlockGate)],
}

impl PageDefinition {
    /// Returns `true` if `block_id` is registered for this page.
    pub fn contains(&self, block_id: &str) -> bool {
        self.blocks.iter().any(|(id, _)| *id == block_id)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.blocks.iter().map(|(id, _)| *id)
    }

    /// Builds the catalog for this page, without default geometry.
    pub fn descriptors(&self) -> Vec<BlockDescriptor> {
        self.blocks
            .iter()
            .map(|(id, gate)| {
                let block = BlockDescriptor::new(*id);
                match gate.requirement() {
                    Some(requirement) => block.with_permission(requirement),
                    None => block,
                }
            })
            .collect()
    }
}

use Action::{Edit, View};
use BlockGate::{Admin, Module, Open};

const PAGES: &[PageDefinition] = &[
    PageDefinition {
        key: "home",
        blocks: &[("home-dashboard", Open)],
    },
    PageDefinition {
        key: "module:barcode",
        blocks: &[("barcode-main", Module("barcode", View))],
    },
    PageDefinition {
        key: "module:clothing:inventory",
        blocks: &[
            ("inventory-main", Module("clothing", View)),
            ("inventory-orders", Module("clothing", View)),
            ("inventory-stats", Module("clothing", View)),
        ],
    },
    PageDefinition {
        key: "module:clothing:purchase-orders",
        blocks: &[("purchase-orders-panel", Module("purchase_orders", View))],
    },
    PageDefinition {
        key: "module:purchasing:suggestions",
        blocks: &[("purchase-suggestions-panel", Module("purchase_suggestions", View))],
    },
    PageDefinition {
        key: "module:reports:clothing",
        blocks: &[("reports-main", Module("reports", View))],
    },
    PageDefinition {
        key: "module:suppliers",
        blocks: &[("suppliers-main", Module("suppliers", View))],
    },
    PageDefinition {
        key: "module:clothing:collaborators",
        blocks: &[
            ("collaborators-table", Module("collaborators", View)),
            ("collaborators-form", Module("collaborators", Edit)),
        ],
    },
    PageDefinition {
        key: "module:dotations",
        blocks: &[("dotations-main", Module("dotations", View))],
    },
    PageDefinition {
        key: "module:pharmacy:inventory",
        blocks: &[
            ("pharmacy-header", Module("pharmacy", View)),
            ("pharmacy-search", Module("pharmacy", View)),
            ("pharmacy-items", Module("pharmacy", View)),
            ("pharmacy-lots", Module("pharmacy", View)),
            ("pharmacy-low-stock", Module("pharmacy", View)),
            ("pharmacy-orders", Module("pharmacy", View)),
            ("pharmacy-side-panel", Module("pharmacy", View)),
            ("pharmacy-categories", Module("pharmacy", View)),
            ("pharmacy-stats", Module("pharmacy", View)),
        ],
    },
    PageDefinition {
        key: "module:vehicle:inventory",
        blocks: &[
            ("vehicle-header", Module("vehicle_inventory", View)),
            ("vehicle-list", Module("vehicle_inventory", View)),
            ("vehicle-detail", Module("vehicle_inventory", View)),
        ],
    },
    PageDefinition {
        key: "module:vehicle:qr",
        blocks: &[("vehicle-qr-main", Module("vehicle_qr", View))],
    },
    PageDefinition {
        key: "module:vehicle:guide",
        blocks: &[("vehicle-guide-main", Module("vehicle_inventory", View))],
    },
    PageDefinition {
        key: "module:remise:inventory",
        blocks: &[
            ("remise-header", Module("inventory_remise", View)),
            ("remise-filters", Module("inventory_remise", View)),
            ("remise-items", Module("inventory_remise", View)),
            ("remise-orders", Module("inventory_remise", View)),
            ("remise-lots", Module("inventory_remise", View)),
            ("remise-stats", Module("inventory_remise", View)),
        ],
    },
    PageDefinition {
        key: "module:settings",
        blocks: &[("settings-main", Open)],
    },
    PageDefinition {
        key: "admin:users",
        blocks: &[("admin-users-main", Admin)],
    },
    PageDefinition {
        key: "admin:permissions",
        blocks: &[("permissions-main", Admin)],
    },
    PageDefinition {
        key: "system:updates",
        blocks: &[("updates-main", Admin)],
    },
    PageDefinition {
        key: "admin:settings",
        blocks: &[("admin-settings-main", Admin), ("admin-db-settings", Admin)],
    },
    PageDefinition {
        key: "admin:system-config",
        blocks: &[("system-config-main", Admin)],
    },
    PageDefinition {
        key: "system:about",
        blocks: &[("about-main", Open)],
    },
    PageDefinition {
        key: "system:messages",
        blocks: &[("messages-main", Module("messages", View))],
    },
    PageDefinition {
        key: "module:pdf:studio",
        blocks: &[("pdf-studio-main", Admin)],
    },
];

/// Returns every registered page.
pub fn builtin_pages() -> &'static [PageDefinition] {
    PAGES
}

/// Looks up a registered page by key.
pub fn find_page(key: &str) -> Option<&'static PageDefinition> {
    PAGES.iter().find(|page| page.key == key)
}
