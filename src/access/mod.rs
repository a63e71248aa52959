//! Route guard, menu filter and the route table they are configured from.

pub mod guard;
pub mod navigation;
pub mod routes;

pub use guard::{authorize, authorize_request, Decision, RouteDescriptor, LOGIN_PATH, UNAUTHORIZED_PATH};
pub use navigation::{visible_items, MenuItem};
pub use routes::{normalize_path, NavTable, RouteTable, SiteMap};
