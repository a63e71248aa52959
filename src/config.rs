//! Runtime configuration for the cdsgate binaries.
//! Precedence: command-line flag > environment variable > default. Unparseable
//! values are reported and the lower-precedence value is kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access::{NavTable, SiteMap};
use crate::identity::{CredentialPolicy, FixtureIdentitySource, HttpIdentitySource, IdentityBackend};

pub const ENV_HTTP_PORT: &str = "CDSGATE_HTTP_PORT";
pub const ENV_STATE_DIR: &str = "CDSGATE_STATE_DIR";
pub const ENV_IDENTITIES: &str = "CDSGATE_IDENTITIES";
pub const ENV_IDENTITY_URL: &str = "CDSGATE_IDENTITY_URL";
pub const ENV_NAV: &str = "CDSGATE_NAV";
pub const ENV_CREDENTIALS: &str = "CDSGATE_CREDENTIALS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateConfig {
    pub http_port: u16,
    /// Directory holding `sessions.json` (server) / `session.json` (interpreter)
    pub state_dir: PathBuf,
    /// Identity fixtures file; bundled fixtures when unset
    pub identities_path: Option<PathBuf>,
    /// Remote identity service; takes precedence over `identities_path`
    pub identity_url: Option<String>,
    /// Route/menu table; bundled dashboard table when unset
    pub nav_path: Option<PathBuf>,
    pub credentials: CredentialPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            http_port: 7880,
            state_dir: PathBuf::from("state"),
            identities_path: None,
            identity_url: None,
            nav_path: None,
            credentials: CredentialPolicy::DemoAnyPassword,
        }
    }
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return args.get(i + 1).cloned();
        }
        i += 1;
    }
    None
}

fn parsed<T: std::str::FromStr>(source: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(target: "startup", "ignoring invalid value '{}' for {}", raw, source);
            None
        }
    }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

impl GateConfig {
    /// Resolve from an environment lookup and CLI args. The lookup is injected so
    /// tests do not touch the process environment.
    pub fn resolve<F>(env: F, args: &[String]) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = GateConfig::default();

        if let Some(p) = parsed::<u16>(ENV_HTTP_PORT, env(ENV_HTTP_PORT)) { cfg.http_port = p; }
        if let Some(p) = parsed::<u16>("--http-port", flag_value(args, "--http-port")) { cfg.http_port = p; }

        if let Some(d) = flag_value(args, "--state-dir").or_else(|| env(ENV_STATE_DIR)) { cfg.state_dir = PathBuf::from(d); }
        cfg.identities_path = flag_value(args, "--identities").or_else(|| env(ENV_IDENTITIES)).map(PathBuf::from);
        cfg.identity_url = flag_value(args, "--identity-url").or_else(|| env(ENV_IDENTITY_URL)).filter(|s| !s.trim().is_empty());
        cfg.nav_path = flag_value(args, "--nav").or_else(|| env(ENV_NAV)).map(PathBuf::from);

        if let Some(c) = parsed::<CredentialPolicy>(ENV_CREDENTIALS, env(ENV_CREDENTIALS)) { cfg.credentials = c; }
        if let Some(c) = parsed::<CredentialPolicy>("--credentials", flag_value(args, "--credentials")) { cfg.credentials = c; }
        cfg
    }

    pub fn from_env_and_args(args: &[String]) -> Self {
        Self::resolve(|k| std::env::var(k).ok(), args)
    }

    pub fn sessions_file(&self) -> PathBuf { self.state_dir.join("sessions.json") }

    pub fn local_session_file(&self) -> PathBuf { self.state_dir.join("session.json") }

    pub fn identity_backend(&self) -> Result<Arc<IdentityBackend>> {
        let backend = if let Some(url) = &self.identity_url {
            info!(target: "startup", "identity source: remote {}", url);
            IdentityBackend::Http(HttpIdentitySource::new(url)?)
        } else if let Some(path) = &self.identities_path {
            info!(target: "startup", "identity source: fixtures {}", path.display());
            IdentityBackend::Fixture(FixtureIdentitySource::from_path(path)?)
        } else {
            info!(target: "startup", "identity source: bundled demo fixtures");
            IdentityBackend::Fixture(FixtureIdentitySource::bundled()?)
        };
        Ok(Arc::new(backend))
    }

    pub fn site_map(&self) -> Result<SiteMap> {
        let table = match &self.nav_path {
            Some(p) => NavTable::from_path(p)?,
            None => NavTable::dashboard()?,
        };
        SiteMap::build(table).with_context(|| format!("navigation table {}", self.nav_source()))
    }

    fn nav_source(&self) -> String {
        self.nav_path.as_deref().map(Path::display).map(|d| d.to_string()).unwrap_or_else(|| "<bundled>".to_string())
    }
}
