use serde::{Deserialize, Serialize};

use super::permission::PermissionSet;
use super::role::Role;

/// Display attributes. Carried for the UI only; never consulted for access decisions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

/// The authenticated principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub permissions: PermissionSet,
    #[serde(default)]
    pub profile: Profile,
}

impl Identity {
    /// Identity with the role's default permission set.
    pub fn for_role(id: impl Into<String>, role: Role) -> Self {
        Identity { id: id.into(), role, permissions: role.default_permissions(), profile: Profile::default() }
    }

    pub fn with_permissions(mut self, permissions: PermissionSet) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn email(&self) -> &str { &self.profile.email }
}

/// A row as the identity source stores it. Permissions are not part of the row:
/// they are derived from `role` when the record is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    /// Argon2 PHC string; only consulted by the strict credential policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl IdentityRecord {
    pub fn resolve(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            role: self.role,
            permissions: self.role.default_permissions(),
            profile: Profile {
                name: self.name.clone(),
                email: self.email.clone(),
                avatar: self.avatar.clone(),
                department: self.department.clone(),
            },
        }
    }

    /// Trimmed, ASCII-case-insensitive email comparison.
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}
