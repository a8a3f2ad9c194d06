//! Block descriptors: the static catalog entries a page supplies.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::breakpoint::Breakpoint;
use super::geometry::{GridRect, LayoutItem};

/// Action a module permission is checked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    View,
    Edit,
}

/// Returned when a string is neither `view` nor `edit`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "edit" => Ok(Action::Edit),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// What a user needs in order to see a block (or edit a page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermissionRequirement {
    /// Access to a named module.  A missing action means [`Action::View`].
    Module {
        module: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<Action>,
    },
    /// Only administrators qualify.
    AdminOnly,
}

impl PermissionRequirement {
    /// Shorthand for a module requirement with an explicit action.
    pub fn module(module: impl Into<String>, action: Action) -> Self {
        PermissionRequirement::Module {
            module: module.into(),
            action: Some(action),
        }
    }
}

/// Renders a block's content into the cell the engine assigned to it.
///
/// The engine never inspects the output; it only decides *which* blocks are
/// rendered and *where*.
pub trait BlockRenderer: Send + Sync {
    fn render(&self, item: &LayoutItem) -> String;
}

impl<F> BlockRenderer for F
where
    F: Fn(&LayoutItem) -> String + Send + Sync,
{
    fn render(&self, item: &LayoutItem) -> String {
        self(item)
    }
}

/// One catalog entry.
#[derive(Clone)]
pub struct BlockDescriptor {
    /// Unique id within the page.
    pub id: String,
    /// Required blocks can never be hidden.
    pub required: bool,
    /// Hidden until the user shows it (ignored for required blocks).
    pub default_hidden: bool,
    /// Permission gate; `None` falls back to the page-level requirement.
    pub permission: Option<PermissionRequirement>,
    /// Page-supplied starting geometry per breakpoint.
    pub defaults: BTreeMap<Breakpoint, GridRect>,
    pub renderer: Option<Arc<dyn BlockRenderer>>,
}

impl BlockDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            required: false,
            default_hidden: false,
            permission: None,
            defaults: BTreeMap::new(),
            renderer: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden_by_default(mut self) -> Self {
        self.default_hidden = true;
        self
    }

    pub fn with_permission(mut self, permission: PermissionRequirement) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn with_default(mut self, breakpoint: Breakpoint, rect: GridRect) -> Self {
        self.defaults.insert(breakpoint, rect);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn BlockRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Renders the block, or `None` if the page registered no renderer.
    pub fn render(&self, item: &LayoutItem) -> Option<String> {
        self.renderer.as_ref().map(|r| r.render(item))
    }
}

impl fmt::Debug for BlockDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("id", &self.id)
            .field("required", &self.required)
            .field("default_hidden", &self.default_hidden)
            .field("permission", &self.permission)
            .field("defaults", &self.defaults)
            .field("renderer", &self.renderer.as_ref().map(|_| "<renderer>"))
            .finish()
    }
}
