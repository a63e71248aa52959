//!
//! cdsgate HTTP server
//! -------------------
//! Axum frontend over the session store, route guard and menu filter.
//!
//! Responsibilities:
//! - Cookie-keyed client sessions; each client gets its own `SessionStore` persisted
//!   under `cdsgate.current_user:<sid>` in the shared sessions file.
//! - Login/switch/logout endpoints.
//! - Navigation decisions and the filtered menu for the calling client.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::{get, post}, Json, Router};
use getrandom::getrandom;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::access::{authorize_request, SiteMap};
use crate::config::GateConfig;
use crate::error::AppError;
use crate::identity::{CredentialPolicy, Identity, IdentityBackend, IdentitySource, Navigation, SessionState, SessionStore};
use crate::storage::{session_key_for, FileKv, KeyValueStore};

pub const SESSION_COOKIE: &str = "cdsgate_session";

type ClientSession = Arc<SessionStore<IdentityBackend>>;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<IdentityBackend>,
    pub kv: Arc<dyn KeyValueStore>,
    pub site: Arc<SiteMap>,
    pub policy: CredentialPolicy,
    /// Session id -> that client's session store
    pub sessions: Arc<RwLock<HashMap<String, ClientSession>>>,
}

impl AppState {
    pub fn new(source: Arc<IdentityBackend>, kv: Arc<dyn KeyValueStore>, site: SiteMap, policy: CredentialPolicy) -> Self {
        Self { source, kv, site: Arc::new(site), policy, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    fn store_for(&self, sid: &str) -> SessionStore<IdentityBackend> {
        SessionStore::new(self.source.clone(), self.kv.clone())
            .with_key(session_key_for(sid))
            .with_policy(self.policy)
    }

    /// Session for the request's cookie. A sid unknown to this process is restored
    /// from storage (sessions survive restarts); if nothing is stored it is ignored.
    async fn existing(&self, headers: &HeaderMap) -> Option<(String, ClientSession)> {
        let sid = parse_cookie(headers, SESSION_COOKIE)?;
        if let Some(s) = self.sessions.read().await.get(&sid) {
            return Some((sid, s.clone()));
        }
        let store = self.store_for(&sid);
        match store.restore().await {
            Ok(Some(_)) => {
                let store = Arc::new(store);
                let mut map = self.sessions.write().await;
                let entry = map.entry(sid.clone()).or_insert(store);
                Some((sid, entry.clone()))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(target: "cdsgate::server", "restoring session failed: {}", e);
                None
            }
        }
    }

    /// Settled, empty session under a new sid. Not registered until a transition
    /// on it succeeds, so failed attempts leave nothing behind.
    async fn fresh(&self) -> (String, SessionStore<IdentityBackend>) {
        let sid = gen_session_id();
        let store = self.store_for(&sid);
        // Fresh key: settles anonymous without touching the source
        let _ = store.restore().await;
        (sid, store)
    }

    async fn register(&self, sid: &str, store: SessionStore<IdentityBackend>) {
        self.sessions.write().await.insert(sid.to_string(), Arc::new(store));
    }

    /// Destroy the session behind `sid` whether or not this process has loaded it.
    /// Unloaded sessions are cleared straight from storage; restoring them first
    /// would depend on the identity source being reachable.
    async fn end_session(&self, sid: &str) {
        let loaded = self.sessions.write().await.remove(sid);
        match loaded {
            Some(store) => store.logout(),
            None => {
                if let Err(e) = self.kv.remove(&session_key_for(sid)) {
                    warn!(target: "cdsgate::server", "clearing stored session failed: {}", e);
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({"status": "error", "error": self}))).into_response()
    }
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

fn gen_session_id() -> String {
    let mut bytes = [0u8; 16];
    let _ = getrandom(&mut bytes);
    let mut sid = String::with_capacity(32);
    use std::fmt::Write as _;
    for b in &bytes { let _ = write!(&mut sid, "{:02x}", b); }
    sid
}

fn session_cookie_headers(sid: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    // sid is hex, always a valid header value
    if let Ok(v) = HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, sid)) {
        headers.insert(header::SET_COOKIE, v);
    }
    headers
}

fn clear_session_cookie_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("cdsgate_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/"),
    );
    headers
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct SwitchPayload {
    identity_id: String,
}

#[derive(Debug, Deserialize)]
struct NavigateQuery {
    path: String,
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "cdsgate"}))
}

async fn list_identities(State(state): State<AppState>) -> Result<Response, AppError> {
    let records = state.source.list_identities().await?;
    let identities: Vec<Identity> = records.iter().map(|r| r.resolve()).collect();
    Ok(Json(json!({"identities": identities})).into_response())
}

/// Login always issues a new sid; the previous session (if any) is destroyed
/// only once the new one is established.
async fn login(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<LoginPayload>) -> Result<Response, AppError> {
    let previous = parse_cookie(&headers, SESSION_COOKIE);
    let (sid, store) = state.fresh().await;
    let identity = store.login(&payload.email, &payload.password).await?;
    if let Some(old) = previous {
        state.end_session(&old).await;
    }
    state.register(&sid, store).await;
    Ok((StatusCode::OK, session_cookie_headers(&sid), Json(json!({"status": "ok", "identity": identity}))).into_response())
}

async fn switch(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<SwitchPayload>) -> Result<Response, AppError> {
    let (sid, identity) = match state.existing(&headers).await {
        Some((sid, store)) => {
            let identity = store.switch(&payload.identity_id).await?;
            (sid, identity)
        }
        None => {
            let (sid, store) = state.fresh().await;
            let identity = store.switch(&payload.identity_id).await?;
            state.register(&sid, store).await;
            (sid, identity)
        }
    };
    Ok((StatusCode::OK, session_cookie_headers(&sid), Json(json!({"status": "ok", "identity": identity}))).into_response())
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        state.end_session(&sid).await;
    }
    (StatusCode::OK, clear_session_cookie_headers(), Json(json!({"status": "ok"})))
}

async fn session(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let snapshot = match state.existing(&headers).await {
        Some((_, store)) => store.state(),
        None => SessionState::Anonymous,
    };
    Json(snapshot)
}

async fn navigate(State(state): State<AppState>, headers: HeaderMap, Query(q): Query<NavigateQuery>) -> Result<Response, AppError> {
    let Some(route) = state.site.route_for(&q.path) else {
        return Err(AppError::not_found("unknown_path".to_string(), format!("no route matches {}", q.path)));
    };
    let nav = match state.existing(&headers).await {
        Some((_, store)) => store.navigate(route, &q.path),
        None => Navigation::Ready(authorize_request(None, route, &q.path)),
    };
    let location = match &nav {
        Navigation::Ready(d) => d.redirect_location(),
        Navigation::Pending => None,
    };
    debug!(target: "cdsgate::server", "navigate path={} route={} location={:?}", q.path, route.path, location);
    Ok(Json(json!({"path": q.path, "route": route.path, "navigation": nav, "location": location})).into_response())
}

async fn menu(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let items = match state.existing(&headers).await {
        Some((_, store)) => store.visible_menu(&state.site),
        None => Some(state.site.visible_menu(None)),
    };
    match items {
        Some(items) => Json(json!({"status": "ready", "items": items})),
        None => Json(json!({"status": "pending", "items": []})),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/identities", get(list_identities))
        .route("/session", get(session))
        .route("/session/login", post(login))
        .route("/session/switch", post(switch))
        .route("/session/logout", post(logout))
        .route("/navigate", get(navigate))
        .route("/menu", get(menu))
        .with_state(state)
}

/// Assemble state from configuration: identity source, nav table, sessions file.
pub fn build_state(config: &GateConfig) -> anyhow::Result<AppState> {
    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("Failed to create or access state dir: {}", config.state_dir.display()))?;
    let source = config.identity_backend()?;
    let site = config.site_map()?;
    let kv = FileKv::open(config.sessions_file())?;
    info!(
        target: "startup",
        "sessions file={}, routes={}, menu_items={}, credentials={:?}",
        kv.path().display(), site.routes().len(), site.menu().len(), config.credentials
    );
    Ok(AppState::new(source, Arc::new(kv), site, config.credentials))
}

pub async fn run(config: GateConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!(target: "startup", "cdsgate listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
