use std::borrow::{Borrow, Cow};
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque capability token, e.g. `view_patients`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Permission {
    fn borrow(&self) -> &str { &self.0 }
}

/// Unique, unordered permission tokens. Backed by a BTreeSet so serialized output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self { Self::default() }

    pub fn contains(&self, token: &str) -> bool { self.0.contains(token) }

    pub fn insert(&mut self, p: Permission) -> bool { self.0.insert(p) }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> { self.0.iter() }

    /// Tokens of `self` absent from `granted`, in stable order.
    pub fn missing_from(&self, granted: &PermissionSet) -> Vec<Permission> {
        self.0.difference(&granted.0).cloned().collect()
    }

    pub fn is_subset(&self, other: &PermissionSet) -> bool { self.0.is_subset(&other.0) }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        PermissionSet(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        PermissionSet(iter.into_iter().map(|s| Permission::new(s.to_string())).collect())
    }
}
