use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::permission::{Permission, PermissionSet};

/// Coarse-grained role. Closed set; adding a role means revisiting `default_permissions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Guest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }

    /// Fixed role -> permission table applied whenever an identity is resolved.
    pub fn default_permissions(&self) -> PermissionSet {
        let tokens: &[&'static str] = match self {
            Role::Admin => &[
                "view_dashboard",
                "view_patients",
                "edit_patients",
                "cds_access",
                "coding_access",
                "claims_access",
                "preauth_access",
                "agent_status",
                "audit_logs",
                "quality_metrics",
                "manage_users",
                "system_settings",
            ],
            Role::User => &[
                "view_dashboard",
                "view_patients",
                "cds_access",
                "coding_access",
                "claims_access",
                "preauth_access",
                "agent_status",
            ],
            Role::Guest => &["view_dashboard"],
        };
        tokens.iter().map(|t| Permission::new(*t)).collect()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Roles admitted by a route or menu entry. Never empty: an unspecified or empty
/// list means every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn all() -> Self { RoleSet(Role::ALL.into_iter().collect()) }

    pub fn of<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        let set: BTreeSet<Role> = roles.into_iter().collect();
        if set.is_empty() { Self::all() } else { RoleSet(set) }
    }

    pub fn contains(&self, role: Role) -> bool { self.0.contains(&role) }

    pub fn is_all(&self) -> bool { self.0.len() == Role::ALL.len() }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ { self.0.iter().copied() }
}

impl Default for RoleSet {
    fn default() -> Self { Self::all() }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roles = Vec::<Role>::deserialize(deserializer)?;
        Ok(RoleSet::of(roles))
    }
}
