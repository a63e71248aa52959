//! Client session store: the single owner of the current identity.
//!
//! Every transition (login, switch, restore) takes a ticket before it awaits the
//! identity source. Only the holder of the latest ticket may settle the session;
//! older resolutions come back as `AccessError::Superseded` and change nothing.
//! `logout` is synchronous and invalidates whatever is in flight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::credentials::CredentialPolicy;
use super::principal::Identity;
use super::source::IdentitySource;
use crate::access::{authorize_request, Decision, MenuItem, RouteDescriptor, SiteMap};
use crate::error::{AccessError, AccessResult};
use crate::storage::{KeyValueStore, SESSION_KEY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum SessionState {
    /// A login/switch/restore is resolving; do not evaluate guards yet.
    Loading,
    Anonymous,
    Active(Identity),
}

/// Outcome of a navigation attempt against the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Navigation {
    Pending,
    Ready(Decision),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSession {
    identity: Identity,
    established_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    identity: Option<Identity>,
    established_at: Option<DateTime<Utc>>,
    in_flight: Option<u64>,
    next_ticket: u64,
}

pub struct SessionStore<S> {
    source: Arc<S>,
    storage: Arc<dyn KeyValueStore>,
    key: String,
    policy: CredentialPolicy,
    inner: Mutex<Inner>,
}

impl<S: IdentitySource> SessionStore<S> {
    /// New store in the `Loading` state; call `restore` (or use `open`) to settle it.
    pub fn new(source: Arc<S>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            source,
            storage,
            key: SESSION_KEY.to_string(),
            policy: CredentialPolicy::default(),
            inner: Mutex::new(Inner { identity: None, established_at: None, in_flight: Some(0), next_ticket: 1 }),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_policy(mut self, policy: CredentialPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Construct and restore in one step. Restore failures leave an anonymous session.
    pub async fn open(source: Arc<S>, storage: Arc<dyn KeyValueStore>) -> Self {
        let store = Self::new(source, storage);
        if let Err(e) = store.restore().await {
            warn!(target: "cdsgate::session", "restore failed key={}: {}", store.key, e);
        }
        store
    }

    pub fn storage_key(&self) -> &str { &self.key }

    pub fn policy(&self) -> CredentialPolicy { self.policy }

    /// Settled identity. Unaffected by an in-flight transition until it commits.
    pub fn current(&self) -> Option<Identity> {
        self.inner.lock().identity.clone()
    }

    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().established_at
    }

    pub fn state(&self) -> SessionState {
        let g = self.inner.lock();
        if g.in_flight.is_some() { return SessionState::Loading; }
        match &g.identity {
            Some(i) => SessionState::Active(i.clone()),
            None => SessionState::Anonymous,
        }
    }

    pub fn is_loading(&self) -> bool { self.inner.lock().in_flight.is_some() }

    /// Resolve `email` against the identity source and establish the session.
    pub async fn login(&self, email: &str, password: &str) -> AccessResult<Identity> {
        let ticket = self.begin();
        debug!(target: "cdsgate::session", "login start email={} ticket={}", email, ticket);
        let resolved = self.resolve_login(email, password).await;
        match resolved {
            Ok(identity) => {
                let identity = self.commit(ticket, identity, Utc::now())?;
                info!(target: "cdsgate::session", "login id={} role={}", identity.id, identity.role);
                Ok(identity)
            }
            Err(e) => {
                self.abandon(ticket)?;
                info!(target: "cdsgate::session", "login rejected email={}: {}", email, e);
                Err(e)
            }
        }
    }

    async fn resolve_login(&self, email: &str, password: &str) -> AccessResult<Identity> {
        if email.trim().is_empty() {
            return Err(AccessError::InvalidCredentials);
        }
        let records = self.source.list_identities().await?;
        let Some(record) = records.iter().find(|r| r.email_matches(email)) else {
            return Err(AccessError::InvalidCredentials);
        };
        if !self.policy.accepts(record, password) {
            return Err(AccessError::InvalidCredentials);
        }
        Ok(record.resolve())
    }

    /// Replace the session with another identity without logging out.
    pub async fn switch(&self, identity_id: &str) -> AccessResult<Identity> {
        let ticket = self.begin();
        let looked_up = self.source.get_identity_by_id(identity_id).await;
        match looked_up {
            Ok(Some(record)) => {
                let identity = self.commit(ticket, record.resolve(), Utc::now())?;
                info!(target: "cdsgate::session", "switch id={} role={}", identity.id, identity.role);
                Ok(identity)
            }
            Ok(None) => {
                self.abandon(ticket)?;
                Err(AccessError::IdentityNotFound(identity_id.to_string()))
            }
            Err(e) => {
                self.abandon(ticket)?;
                Err(e)
            }
        }
    }

    pub fn logout(&self) {
        let mut g = self.inner.lock();
        g.next_ticket += 1;
        g.in_flight = None;
        let previous = g.identity.take();
        g.established_at = None;
        if let Err(e) = self.storage.remove(&self.key) {
            warn!(target: "cdsgate::session", "clearing {} failed: {}", self.key, e);
        }
        if let Some(p) = previous {
            info!(target: "cdsgate::session", "logout id={}", p.id);
        }
    }

    /// Re-establish the session from storage. The stored identity is only trusted for
    /// its id; role and permissions are re-resolved from the source.
    ///
    /// Stale ids and corrupt records clear the stored key and yield `Ok(None)`.
    /// A source failure leaves the session anonymous but keeps the key.
    pub async fn restore(&self) -> AccessResult<Option<Identity>> {
        let ticket = self.begin();
        let stored = match self.storage.get(&self.key) {
            Ok(v) => v,
            Err(e) => {
                self.settle_anonymous(ticket, false)?;
                return Err(e);
            }
        };
        let Some(text) = stored else {
            self.settle_anonymous(ticket, false)?;
            return Ok(None);
        };
        let persisted: PersistedSession = match serde_json::from_str(&text) {
            Ok(p) => p,
            Err(e) => {
                warn!(target: "cdsgate::session", "discarding unreadable session under {}: {}", self.key, e);
                self.settle_anonymous(ticket, true)?;
                return Ok(None);
            }
        };
        match self.source.get_identity_by_id(&persisted.identity.id).await {
            Ok(Some(record)) => {
                let identity = self.commit(ticket, record.resolve(), persisted.established_at)?;
                info!(target: "cdsgate::session", "restored id={} role={}", identity.id, identity.role);
                Ok(Some(identity))
            }
            Ok(None) => {
                info!(target: "cdsgate::session", "stored identity {} no longer exists; clearing", persisted.identity.id);
                self.settle_anonymous(ticket, true)?;
                Ok(None)
            }
            Err(e) => {
                self.settle_anonymous(ticket, false)?;
                Err(e)
            }
        }
    }

    /// Guard the route against the settled identity, or `Pending` while resolving.
    pub fn navigate(&self, route: &RouteDescriptor, requested: &str) -> Navigation {
        let g = self.inner.lock();
        if g.in_flight.is_some() { return Navigation::Pending; }
        Navigation::Ready(authorize_request(g.identity.as_ref(), route, requested))
    }

    /// `navigate` for a concrete path; `None` when the path matches no route.
    pub fn navigate_path(&self, site: &SiteMap, path: &str) -> Option<Navigation> {
        let route = site.route_for(path)?;
        Some(self.navigate(route, path))
    }

    /// Menu for the settled identity, or `None` while a transition is resolving
    /// (same window in which `navigate` answers `Pending`).
    pub fn visible_menu<'m>(&self, site: &'m SiteMap) -> Option<Vec<&'m MenuItem>> {
        let g = self.inner.lock();
        if g.in_flight.is_some() { return None; }
        Some(site.visible_menu(g.identity.as_ref()))
    }

    fn begin(&self) -> u64 {
        let mut g = self.inner.lock();
        let ticket = g.next_ticket;
        g.next_ticket += 1;
        g.in_flight = Some(ticket);
        ticket
    }

    fn commit(&self, ticket: u64, identity: Identity, established_at: DateTime<Utc>) -> AccessResult<Identity> {
        let mut g = self.inner.lock();
        if g.in_flight != Some(ticket) {
            debug!(target: "cdsgate::session", "discarding superseded resolution ticket={}", ticket);
            return Err(AccessError::Superseded);
        }
        let record = PersistedSession { identity: identity.clone(), established_at };
        match serde_json::to_string(&record) {
            Ok(text) => {
                if let Err(e) = self.storage.set(&self.key, &text) {
                    warn!(target: "cdsgate::session", "persisting {} failed: {}", self.key, e);
                }
            }
            Err(e) => warn!(target: "cdsgate::session", "serializing session failed: {}", e),
        }
        g.identity = Some(identity.clone());
        g.established_at = Some(established_at);
        g.in_flight = None;
        Ok(identity)
    }

    /// Failed login/switch: end the loading window, keep the settled session.
    fn abandon(&self, ticket: u64) -> AccessResult<()> {
        let mut g = self.inner.lock();
        if g.in_flight != Some(ticket) { return Err(AccessError::Superseded); }
        g.in_flight = None;
        Ok(())
    }

    fn settle_anonymous(&self, ticket: u64, clear_storage: bool) -> AccessResult<()> {
        let mut g = self.inner.lock();
        if g.in_flight != Some(ticket) { return Err(AccessError::Superseded); }
        g.in_flight = None;
        g.identity = None;
        g.established_at = None;
        if clear_storage {
            if let Err(e) = self.storage.remove(&self.key) {
                warn!(target: "cdsgate::session", "clearing {} failed: {}", self.key, e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
