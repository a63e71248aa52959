use serde::{Deserialize, Serialize};

use crate::identity::{Identity, Requirement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub label: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(flatten)]
    pub requires: Requirement,
}

impl MenuItem {
    pub fn new(label: impl Into<String>, path: impl Into<String>, requires: Requirement) -> Self {
        Self { label: label.into(), path: path.into(), icon: None, section: None, requires }
    }
}

/// Menu entries the identity may see, in menu order. Same test as the route guard
/// minus the authentication step: no identity sees nothing.
pub fn visible_items<'m>(identity: Option<&Identity>, menu: &'m [MenuItem]) -> Vec<&'m MenuItem> {
    menu.iter().filter(|item| item.requires.admits(identity)).collect()
}
