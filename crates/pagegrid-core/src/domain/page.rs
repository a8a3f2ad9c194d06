//! A page catalog resolved for one user.
//!
//! [`PageCatalog::resolve`] runs the permission filter and the normalizer
//! once, so that everything downstream (merging saved state, editing,
//! rendering) works on the same allowed block list and the same defaults.

use super::block::{BlockDescriptor, PermissionRequirement};
use super::geometry::{HiddenBlockSet, LayoutSet, RawLayoutSet};
use super::merge::{default_hidden, merge_hidden, merge_layouts};
use super::normalize::normalize_defaults;
use super::permission::{can_edit_page, filter_allowed_blocks, AccessChecker, UserContext};
use crate::catalog::PageDefinition;

/// The static description of one customizable page.
#[derive(Debug, Clone)]
pub struct PageCatalog {
    pub key: String,
    pub blocks: Vec<BlockDescriptor>,
    /// Needed to customize the page; also inherited by blocks without their own.
    pub requirement: Option<PermissionRequirement>,
}

impl PageCatalog {
    pub fn new(key: impl Into<String>, blocks: Vec<BlockDescriptor>) -> Self {
        Self {
            key: key.into(),
            blocks,
            requirement: None,
        }
    }

    pub fn with_requirement(mut self, requirement: PermissionRequirement) -> Self {
        self.requirement = Some(requirement);
        self
    }

    /// Builds the catalog of a built-in page.
    pub fn from_definition(definition: &PageDefinition) -> Self {
        Self::new(definition.key, definition.descriptors())
    }

    /// Filters the catalog for `user` and computes the default arrangement.
    pub fn resolve(&self, user: &UserContext, checker: &dyn AccessChecker) -> ResolvedPage {
        let allowed: Vec<BlockDescriptor> =
            filter_allowed_blocks(&self.blocks, user, checker, self.requirement.as_ref())
                .into_iter()
                .cloned()
                .collect();
        let refs: Vec<&BlockDescriptor> = allowed.iter().collect();
        let defaults = normalize_defaults(&refs);
        let default_hidden = default_hidden(&refs);
        ResolvedPage {
            key: self.key.clone(),
            can_edit: can_edit_page(user, checker, self.requirement.as_ref()),
            allowed,
            defaults,
            default_hidden,
        }
    }
}

/// A page as one particular user sees it.
#[derive(Debug, Clone)]
pub struct ResolvedPage {
    pub key: String,
    /// The blocks the user may see, in catalog order.
    pub allowed: Vec<BlockDescriptor>,
    pub can_edit: bool,
    /// Normalizer output for `allowed`: fallback and reset target.
    pub defaults: LayoutSet,
    pub default_hidden: HiddenBlockSet,
}

impl ResolvedPage {
    pub fn allowed_refs(&self) -> Vec<&BlockDescriptor> {
        self.allowed.iter().collect()
    }

    pub fn block(&self, id: &str) -> Option<&BlockDescriptor> {
        self.allowed.iter().find(|b| b.id == id)
    }

    /// Reconciles persisted state with this page.
    pub fn merge(
        &self,
        layouts: Option<&RawLayoutSet>,
        hidden: Option<&[String]>,
    ) -> (LayoutSet, HiddenBlockSet) {
        let refs = self.allowed_refs();
        (
            merge_layouts(&self.defaults, layouts, &refs),
            merge_hidden(&refs, hidden),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::find_page;
    use crate::domain::block::Action;
    use crate::domain::breakpoint::Breakpoint;
    use crate::domain::permission::{ModulePermissions, Role};

    #[test]
    fn test_resolve_filters_blocks_and_builds_matching_defaults() {
        // Arrange
        let page = PageCatalog::from_definition(find_page("module:clothing:collaborators").unwrap());
        let checker = ModulePermissions::new().grant("collaborators", Action::View);
        let user = UserContext::new("alice", Role::User);

        // Act
        let resolved = page.resolve(&user, &checker);

        // Assert
        let ids: Vec<&str> = resolved.allowed.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["collaborators-table"]);
        assert_eq!(resolved.defaults.get(Breakpoint::Lg).len(), 1);
        assert!(resolved.can_edit);
    }

    #[test]
    fn test_resolve_page_requirement_controls_can_edit() {
        let page = PageCatalog::new("reports", vec![BlockDescriptor::new("chart")])
            .with_requirement(PermissionRequirement::module("reports", Action::Edit));
        let user = UserContext::new("bob", Role::User);

        let resolved = page.resolve(&user, &ModulePermissions::new());

        assert!(!resolved.can_edit);
        assert!(resolved.allowed.is_empty(), "chart inherits the page requirement");
    }

    #[test]
    fn test_merge_without_saved_state_returns_defaults() {
        let page = PageCatalog::new(
            "home",
            vec![BlockDescriptor::new("a"), BlockDescriptor::new("b").hidden_by_default()],
        );
        let resolved = page.resolve(&UserContext::new("c", Role::User), &ModulePermissions::new());

        let (layouts, hidden) = resolved.merge(None, None);

        assert_eq!(layouts, resolved.defaults);
        assert_eq!(hidden, resolved.default_hidden);
        assert!(hidden.contains("b"));
    }
}
