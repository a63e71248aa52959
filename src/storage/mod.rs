//!
//! cdsgate storage module
//! ----------------------
//! Durable client-side key/value storage used to persist the current session.
//! The session store only ever touches one well-known key per client; values are
//! opaque strings (JSON in practice).
//!
//! Two backends:
//! - `MemoryKv`: process-local map, used by tests and ephemeral sessions.
//! - `FileKv`: a single JSON object file, rewritten atomically on every change.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::AccessResult;

mod file_kv;

pub use file_kv::FileKv;

/// Key under which the serialized current identity is stored.
pub const SESSION_KEY: &str = "cdsgate.current_user";

/// Per-client variant of `SESSION_KEY` for hosts that keep many sessions in one store.
pub fn session_key_for(client_id: &str) -> String {
    format!("{}:{}", SESSION_KEY, client_id)
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> AccessResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AccessResult<()>;
    fn remove(&self, key: &str) -> AccessResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryKv {
    map: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.map.read().len() }

    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> AccessResult<Option<String>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AccessResult<()> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AccessResult<()> {
        self.map.write().remove(key);
        Ok(())
    }
}
