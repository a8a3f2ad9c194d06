//! Permission filter: which catalog blocks a user may see.
//!
//! The evaluation service itself lives outside this crate; the engine only
//! consumes it through the [`AccessChecker`] capability.  Administrators bypass
//! every module check, and blocks marked [`PermissionRequirement::AdminOnly`]
//! are visible to administrators only.

use std::collections::HashMap;

use super::block::{Action, BlockDescriptor, PermissionRequirement};

/// Role flag of the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// The user a layout is being resolved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub username: String,
    pub role: Role,
    /// Site/tenant the user is currently working in, if the product has several.
    pub site: Option<String>,
}

impl UserContext {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
            site: None,
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Capability answering "may the current user perform `action` on `module`?".
#[cfg_attr(test, mockall::automock)]
pub trait AccessChecker: Send + Sync {
    fn can_access(&self, module: &str, action: Action) -> bool;
}

/// Per-module grant, as stored by the permission service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModulePermission {
    pub can_view: bool,
    pub can_edit: bool,
}

/// A simple in-memory permission table implementing [`AccessChecker`].
#[derive(Debug, Clone, Default)]
pub struct ModulePermissions {
    grants: HashMap<String, ModulePermission>,
}

impl ModulePermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `action` on `module`.  Edit does not imply view.
    pub fn grant(mut self, module: impl Into<String>, action: Action) -> Self {
        let entry = self.grants.entry(module.into()).or_default();
        match action {
            Action::View => entry.can_view = true,
            Action::Edit => entry.can_edit = true,
        }
        self
    }

    pub fn set(&mut self, module: impl Into<String>, permission: ModulePermission) {
        self.grants.insert(module.into(), permission);
    }
}

impl AccessChecker for ModulePermissions {
    fn can_access(&self, module: &str, action: Action) -> bool {
        match self.grants.get(module) {
            Some(p) => match action {
                Action::View => p.can_view,
                Action::Edit => p.can_edit,
            },
            None => false,
        }
    }
}

/// Evaluates one requirement for `user`.
pub fn is_allowed(
    requirement: Option<&PermissionRequirement>,
    user: &UserContext,
    checker: &dyn AccessChecker,
) -> bool {
    match requirement {
        None => true,
        Some(PermissionRequirement::AdminOnly) => user.is_admin(),
        Some(PermissionRequirement::Module { module, action }) => {
            user.is_admin() || checker.can_access(module, action.unwrap_or_default())
        }
    }
}

/// Returns the blocks `user` may see, in catalog order.
///
/// A block without its own requirement inherits `page_requirement`.
pub fn filter_allowed_blocks<'a>(
    catalog: &'a [BlockDescriptor],
    user: &UserContext,
    checker: &dyn AccessChecker,
    page_requirement: Option<&PermissionRequirement>,
) -> Vec<&'a BlockDescriptor> {
    catalog
        .iter()
        .filter(|block| {
            let requirement = block.permission.as_ref().or(page_requirement);
            is_allowed(requirement, user, checker)
        })
        .collect()
}

/// Returns `true` if `user` may customize a page guarded by `page_requirement`.
pub fn can_edit_page(
    user: &UserContext,
    checker: &dyn AccessChecker,
    page_requirement: Option<&PermissionRequirement>,
) -> bool {
    is_allowed(page_requirement, user, checker)
}
