use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AccessError, AccessResult};
use crate::identity::{Denial, Identity, Requirement};

pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// A navigable route and the gate in front of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub path: String,
    #[serde(flatten)]
    pub requires: Requirement,
}

impl RouteDescriptor {
    pub fn new(path: impl Into<String>, requires: Requirement) -> Self {
        Self { path: path.into(), requires }
    }

    /// Reachable by every authenticated role.
    pub fn open(path: impl Into<String>) -> Self {
        Self::new(path, Requirement::open())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    /// No session; `return_to` is where login should send the user afterwards.
    RedirectToLogin { return_to: String },
    RedirectToUnauthorized { denial: Denial },
}

impl Decision {
    pub fn is_allowed(&self) -> bool { matches!(self, Decision::Allow) }

    /// Client-side location to redirect to, if any.
    pub fn redirect_location(&self) -> Option<String> {
        match self {
            Decision::Allow => None,
            Decision::RedirectToLogin { return_to } => {
                Some(format!("{}?return_to={}", LOGIN_PATH, urlencoding::encode(return_to)))
            }
            Decision::RedirectToUnauthorized { .. } => Some(UNAUTHORIZED_PATH.to_string()),
        }
    }

    pub fn into_result(self) -> AccessResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::RedirectToLogin { .. } => Err(AccessError::Unauthenticated),
            Decision::RedirectToUnauthorized { denial } => Err(AccessError::Forbidden(denial)),
        }
    }
}

/// Authentication, then role, then permissions. Pure.
pub fn authorize(identity: Option<&Identity>, route: &RouteDescriptor) -> Decision {
    authorize_request(identity, route, &route.path)
}

/// As `authorize`, but remembers the concrete `requested` path (e.g. `/patients/p-17`
/// for the `/patients/:id` route) for the post-login return.
pub fn authorize_request(identity: Option<&Identity>, route: &RouteDescriptor, requested: &str) -> Decision {
    let Some(identity) = identity else {
        return Decision::RedirectToLogin { return_to: requested.to_string() };
    };
    match route.requires.check(identity) {
        Ok(()) => Decision::Allow,
        Err(denial) => {
            debug!(target: "cdsgate::guard", "deny id={} role={} path={} reason={}", identity.id, identity.role, requested, denial);
            Decision::RedirectToUnauthorized { denial }
        }
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod guard_tests;
