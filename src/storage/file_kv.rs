use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::warn;

use super::KeyValueStore;
use crate::error::{AccessError, AccessResult};

/// JSON-object file acting as local persistent storage. The whole map is kept in
/// memory and flushed through a temp file + rename on every mutation.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    map: Mutex<BTreeMap<String, String>>,
}

impl FileKv {
    /// Open (or create on first write) the store at `path`. An unreadable or corrupt
    /// file is logged and replaced by an empty map.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).with_context(|| format!("creating storage dir {}", dir.display()))?;
            }
        }
        let map = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(m) => m,
                Err(e) => {
                    warn!(target: "cdsgate::storage", "discarding corrupt storage file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        Ok(Self { path, map: Mutex::new(map) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn flush(&self, map: &BTreeMap<String, String>) -> AccessResult<()> {
        let text = serde_json::to_string_pretty(map).map_err(|e| AccessError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| AccessError::Storage(format!("{}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| AccessError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for FileKv {
    fn get(&self, key: &str) -> AccessResult<Option<String>> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AccessResult<()> {
        let mut m = self.map.lock();
        m.insert(key.to_string(), value.to_string());
        self.flush(&m)
    }

    fn remove(&self, key: &str) -> AccessResult<()> {
        let mut m = self.map.lock();
        if m.remove(key).is_none() { return Ok(()); }
        self.flush(&m)
    }
}
