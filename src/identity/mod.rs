//! Identity, session and permission primitives for the dashboard.
//! Keep the public surface thin and split implementation across sub-modules.

mod role;
mod permission;
mod principal;
mod predicate;
mod credentials;
mod source;
mod http_source;
mod session;

pub use role::{Role, RoleSet};
pub use permission::{Permission, PermissionSet};
pub use principal::{Identity, IdentityRecord, Profile};
pub use predicate::{has_permission, has_role, Denial, Requirement};
pub use credentials::{hash_password, verify_password, CredentialPolicy};
pub use source::{FixtureIdentitySource, IdentityBackend, IdentitySource};
pub use http_source::HttpIdentitySource;
pub use session::{Navigation, SessionState, SessionStore};
