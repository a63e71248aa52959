//! Identity source backed by a remote user service.
//! Expects `GET {base}/identities` -> `[IdentityRecord]` and
//! `GET {base}/identities/{id}` -> `IdentityRecord` (404 when unknown).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::principal::IdentityRecord;
use super::source::IdentitySource;
use crate::error::{AccessError, AccessResult};

#[derive(Debug, Clone)]
pub struct HttpIdentitySource {
    base: Url,
    client: reqwest::Client,
}

impl HttpIdentitySource {
    pub fn new(base: &str) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = if base.ends_with('/') { base.to_string() } else { format!("{}/", base) };
        let base = Url::parse(&normalized).context("invalid identity service URL")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("building identity service client")?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url { &self.base }

    fn url(&self, rel: &str) -> AccessResult<Url> {
        self.base.join(rel).map_err(|e| AccessError::SourceUnavailable(format!("bad url: {}", e)))
    }
}

fn unavailable(e: reqwest::Error) -> AccessError {
    AccessError::SourceUnavailable(e.to_string())
}

impl IdentitySource for HttpIdentitySource {
    async fn list_identities(&self) -> AccessResult<Vec<IdentityRecord>> {
        let url = self.url("identities")?;
        debug!(target: "cdsgate::source", "GET {}", url);
        let resp = self.client.get(url).send().await.map_err(unavailable)?;
        let resp = resp.error_for_status().map_err(unavailable)?;
        resp.json::<Vec<IdentityRecord>>().await.map_err(unavailable)
    }

    async fn get_identity_by_id(&self, id: &str) -> AccessResult<Option<IdentityRecord>> {
        let url = self.url(&format!("identities/{}", urlencoding::encode(id)))?;
        debug!(target: "cdsgate::source", "GET {}", url);
        let resp = self.client.get(url).send().await.map_err(unavailable)?;
        if resp.status() == StatusCode::NOT_FOUND { return Ok(None); }
        let resp = resp.error_for_status().map_err(unavailable)?;
        resp.json::<IdentityRecord>().await.map(Some).map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_trailing_slash() {
        let s = HttpIdentitySource::new("http://127.0.0.1:9/api").unwrap();
        assert_eq!(s.base_url().as_str(), "http://127.0.0.1:9/api/");
        assert_eq!(s.url("identities").unwrap().as_str(), "http://127.0.0.1:9/api/identities");
    }

    #[test]
    fn invalid_base_is_rejected() {
        assert!(HttpIdentitySource::new("not a url").is_err());
    }

    #[tokio::test]
    async fn unreachable_service_reports_unavailable() {
        // Port 9 (discard) is not served on loopback in test environments
        let s = HttpIdentitySource::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(s.list_identities().await, Err(AccessError::SourceUnavailable(_))));
    }
}
