//! Permission predicates. `Requirement::check` is the one primitive the route guard
//! and the menu filter share, so a route cannot be reachable while hidden from the
//! menu or the other way round.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::permission::{Permission, PermissionSet};
use super::principal::Identity;
use super::role::{Role, RoleSet};

pub fn has_permission(identity: Option<&Identity>, token: &str) -> bool {
    identity.is_some_and(|i| i.permissions.contains(token))
}

pub fn has_role(identity: Option<&Identity>, roles: &[Role]) -> bool {
    identity.is_some_and(|i| roles.contains(&i.role))
}

/// Why an authenticated identity was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "missing", rename_all = "snake_case")]
pub enum Denial {
    Role,
    MissingPermissions(Vec<Permission>),
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Denial::Role => f.write_str("role not permitted"),
            Denial::MissingPermissions(missing) => {
                let names: Vec<&str> = missing.iter().map(|p| p.as_str()).collect();
                write!(f, "missing permissions: {}", names.join(", "))
            }
        }
    }
}

/// Role-set plus permission-set gate carried by routes and menu entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(default)]
    pub required_roles: RoleSet,
    #[serde(default)]
    pub required_permissions: PermissionSet,
}

impl Requirement {
    /// Open to every role, no extra permissions.
    pub fn open() -> Self { Self::default() }

    pub fn roles<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        Requirement { required_roles: RoleSet::of(roles), required_permissions: PermissionSet::new() }
    }

    pub fn with_permissions<'a, I: IntoIterator<Item = &'a str>>(mut self, tokens: I) -> Self {
        for t in tokens { self.required_permissions.insert(Permission::new(t.to_string())); }
        self
    }

    /// Role first, then permissions (all of them).
    pub fn check(&self, identity: &Identity) -> Result<(), Denial> {
        if !self.required_roles.contains(identity.role) {
            return Err(Denial::Role);
        }
        if self.required_permissions.is_empty() { return Ok(()); }
        let missing = self.required_permissions.missing_from(&identity.permissions);
        if missing.is_empty() { Ok(()) } else { Err(Denial::MissingPermissions(missing)) }
    }

    pub fn admits(&self, identity: Option<&Identity>) -> bool {
        identity.is_some_and(|i| self.check(i).is_ok())
    }
}
