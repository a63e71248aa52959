pub mod access;
pub mod config;
pub mod error;
pub mod identity;
pub mod server;
pub mod storage;

pub use access::{authorize, visible_items, Decision, MenuItem, RouteDescriptor, SiteMap};
pub use error::{AccessError, AccessResult};
pub use identity::{has_permission, has_role, Identity, Role, SessionState, SessionStore};

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        if false { let _ = format!($($arg)*); }
    });
}
