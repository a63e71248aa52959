use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use parking_lot::RwLock;

use super::http_source::HttpIdentitySource;
use super::principal::IdentityRecord;
use crate::error::{AccessError, AccessResult};

const BUNDLED_IDENTITIES: &str = include_str!("../../fixtures/identities.json");

/// Backing store the session resolves identities against (user service, fixtures, ...).
pub trait IdentitySource: Send + Sync {
    fn list_identities(&self) -> impl Future<Output = AccessResult<Vec<IdentityRecord>>> + Send;

    fn get_identity_by_id(&self, id: &str) -> impl Future<Output = AccessResult<Option<IdentityRecord>>> + Send;
}

/// In-memory identity list, usually loaded from JSON fixtures.
#[derive(Debug, Default)]
pub struct FixtureIdentitySource {
    records: RwLock<Vec<IdentityRecord>>,
    offline: AtomicBool,
}

impl FixtureIdentitySource {
    pub fn new(records: Vec<IdentityRecord>) -> Self {
        Self { records: RwLock::new(records), offline: AtomicBool::new(false) }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let records: Vec<IdentityRecord> = serde_json::from_str(text).context("invalid identity fixture JSON")?;
        Ok(Self::new(records))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading identity fixtures from {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// The demo directory shipped with the crate.
    pub fn bundled() -> Result<Self> {
        Self::from_json_str(BUNDLED_IDENTITIES)
    }

    /// Replace any record with the same id.
    pub fn upsert(&self, record: IdentityRecord) {
        let mut w = self.records.write();
        w.retain(|r| r.id != record.id);
        w.push(record);
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut w = self.records.write();
        let before = w.len();
        w.retain(|r| r.id != id);
        w.len() != before
    }

    /// Simulate the backing service being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> AccessResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AccessError::SourceUnavailable("fixture source offline".into()));
        }
        Ok(())
    }
}

impl IdentitySource for FixtureIdentitySource {
    async fn list_identities(&self) -> AccessResult<Vec<IdentityRecord>> {
        self.check_online()?;
        Ok(self.records.read().clone())
    }

    async fn get_identity_by_id(&self, id: &str) -> AccessResult<Option<IdentityRecord>> {
        self.check_online()?;
        Ok(self.records.read().iter().find(|r| r.id == id).cloned())
    }
}

/// Source selected at startup from configuration.
#[derive(Debug)]
pub enum IdentityBackend {
    Fixture(FixtureIdentitySource),
    Http(HttpIdentitySource),
}

impl IdentitySource for IdentityBackend {
    async fn list_identities(&self) -> AccessResult<Vec<IdentityRecord>> {
        match self {
            IdentityBackend::Fixture(s) => s.list_identities().await,
            IdentityBackend::Http(s) => s.list_identities().await,
        }
    }

    async fn get_identity_by_id(&self, id: &str) -> AccessResult<Option<IdentityRecord>> {
        match self {
            IdentityBackend::Fixture(s) => s.get_identity_by_id(id).await,
            IdentityBackend::Http(s) => s.get_identity_by_id(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    #[tokio::test]
    async fn bundled_fixtures_load() {
        let src = FixtureIdentitySource::bundled().unwrap();
        let all = src.list_identities().await.unwrap();
        assert!(all.iter().any(|r| r.email == "ahmed.alrashid@nmc.ae" && r.role == Role::Admin));
        assert!(all.iter().any(|r| r.role == Role::Guest));
        let one = src.get_identity_by_id("usr-002").await.unwrap().unwrap();
        assert_eq!(one.role, Role::User);
        assert!(src.get_identity_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_remove_and_offline() {
        let src = FixtureIdentitySource::bundled().unwrap();
        assert!(src.remove("usr-004"));
        assert!(!src.remove("usr-004"));
        assert!(src.get_identity_by_id("usr-004").await.unwrap().is_none());

        let mut rec = src.get_identity_by_id("usr-003").await.unwrap().unwrap();
        rec.role = Role::Admin;
        src.upsert(rec);
        let all = src.list_identities().await.unwrap();
        assert_eq!(all.iter().filter(|r| r.id == "usr-003").count(), 1);
        assert_eq!(src.get_identity_by_id("usr-003").await.unwrap().unwrap().role, Role::Admin);

        src.set_offline(true);
        assert!(matches!(src.list_identities().await, Err(AccessError::SourceUnavailable(_))));
        src.set_offline(false);
        assert!(src.list_identities().await.is_ok());
    }

    #[test]
    fn bad_fixture_json_is_an_error() {
        assert!(FixtureIdentitySource::from_json_str("{not json").is_err());
    }
}
