use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode as AxumStatus;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::tempdir;

use cdsgate::access::SiteMap;
use cdsgate::identity::{
    CredentialPolicy, FixtureIdentitySource, HttpIdentitySource, IdentityBackend, IdentityRecord, IdentitySource, SessionStore,
};
use cdsgate::server::{router, AppState, SESSION_COOKIE};
use cdsgate::storage::{session_key_for, FileKv, KeyValueStore, MemoryKv};
use cdsgate::tprintln;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn state_with(kv: Arc<dyn KeyValueStore>) -> AppState {
    let source = Arc::new(IdentityBackend::Fixture(FixtureIdentitySource::bundled().unwrap()));
    AppState::new(source, kv, SiteMap::dashboard().unwrap(), CredentialPolicy::DemoAnyPassword)
}

/// Minimal client that carries the session cookie by hand.
struct Client {
    base: String,
    http: reqwest::Client,
    cookie: Option<String>,
}

impl Client {
    fn new(addr: SocketAddr) -> Self {
        Self { base: format!("http://{}", addr), http: reqwest::Client::new(), cookie: None }
    }

    fn absorb(&mut self, resp: &reqwest::Response) {
        for val in resp.headers().get_all(reqwest::header::SET_COOKIE).iter() {
            let Ok(s) = val.to_str() else { continue };
            let nv = s.split(';').next().unwrap_or("").trim();
            if let Some(v) = nv.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
                self.cookie = if v == "deleted" { None } else { Some(v.to_string()) };
            }
        }
    }

    async fn send(&mut self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let req = match &self.cookie {
            Some(c) => req.header(reqwest::header::COOKIE, format!("{}={}", SESSION_COOKIE, c)),
            None => req,
        };
        let resp = req.send().await.unwrap();
        self.absorb(&resp);
        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&mut self, path: &str) -> (StatusCode, Value) {
        let req = self.http.get(format!("{}{}", self.base, path));
        self.send(req).await
    }

    async fn post(&mut self, path: &str, body: Value) -> (StatusCode, Value) {
        let req = self.http.post(format!("{}{}", self.base, path)).json(&body);
        self.send(req).await
    }
}

#[tokio::test]
async fn login_navigate_menu_logout() {
    let tmp = tempdir().unwrap();
    let kv = Arc::new(FileKv::open(tmp.path().join("sessions.json")).unwrap());
    let addr = serve(router(state_with(kv))).await;
    let mut c = Client::new(addr);

    let (s, body) = c.get("/").await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = c.get("/session").await;
    assert_eq!(body["state"], "anonymous");
    let (_, body) = c.get("/navigate?path=/claims").await;
    assert_eq!(body["navigation"]["result"]["decision"], "redirect_to_login");
    assert_eq!(body["location"], "/login?return_to=%2Fclaims");

    let (s, body) = c.post("/session/login", json!({"email": "fatima.hassan@nmc.ae", "password": "anything"})).await;
    assert_eq!(s, StatusCode::OK, "{}", body);
    assert_eq!(body["identity"]["id"], "usr-002");
    assert!(c.cookie.is_some());

    let (_, body) = c.get("/session").await;
    assert_eq!(body["state"], "active");
    assert_eq!(body["identity"]["role"], "user");

    let (_, body) = c.get("/navigate?path=/claims/CLM-2024-001").await;
    assert_eq!(body["route"], "/claims/:id");
    assert_eq!(body["navigation"]["result"]["decision"], "allow");
    let (_, body) = c.get("/navigate?path=/audit").await;
    assert_eq!(body["navigation"]["result"]["decision"], "redirect_to_unauthorized");
    assert_eq!(body["location"], "/unauthorized");

    let (_, body) = c.get("/menu").await;
    assert_eq!(body["status"], "ready");
    let labels: Vec<&str> = body["items"].as_array().unwrap().iter().map(|i| i["label"].as_str().unwrap()).collect();
    tprintln!("user menu: {:?}", labels);
    assert_eq!(labels.first(), Some(&"Dashboard"));
    assert!(!labels.contains(&"Audit Logs"));

    let (s, _) = c.post("/session/logout", json!({})).await;
    assert_eq!(s, StatusCode::OK);
    assert!(c.cookie.is_none());
    let (_, body) = c.get("/menu").await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn error_statuses() {
    let addr = serve(router(state_with(Arc::new(MemoryKv::new())))).await;
    let mut c = Client::new(addr);

    let (s, body) = c.post("/session/login", json!({"email": "nobody@nmc.ae", "password": "pw"})).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_credentials");

    let (s, _) = c.post("/session/login", json!({"email": "visitor@nmc.ae", "password": ""})).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);

    let (s, body) = c.post("/session/switch", json!({"identity_id": "usr-999"})).await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "identity_not_found");

    let (s, body) = c.get("/navigate?path=/no/such/page").await;
    assert_eq!(s, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "unknown_path");
}

#[tokio::test]
async fn switch_user_and_identity_list() {
    let addr = serve(router(state_with(Arc::new(MemoryKv::new())))).await;
    let mut c = Client::new(addr);

    let (_, body) = c.get("/identities").await;
    assert_eq!(body["identities"].as_array().unwrap().len(), 4);

    let (s, body) = c.post("/session/switch", json!({"identity_id": "usr-004"})).await;
    assert_eq!(s, StatusCode::OK);
    assert_eq!(body["identity"]["role"], "guest");
    let (_, body) = c.get("/menu").await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (_, body) = c.post("/session/switch", json!({"identity_id": "usr-001"})).await;
    assert_eq!(body["identity"]["role"], "admin");
    let (_, body) = c.get("/navigate?path=/settings/users").await;
    assert_eq!(body["navigation"]["result"]["decision"], "allow");
}

#[tokio::test]
async fn clients_are_isolated() {
    let addr = serve(router(state_with(Arc::new(MemoryKv::new())))).await;
    let mut admin = Client::new(addr);
    let mut guest = Client::new(addr);

    admin.post("/session/login", json!({"email": "ahmed.alrashid@nmc.ae", "password": "pw"})).await;
    guest.post("/session/switch", json!({"identity_id": "usr-004"})).await;
    assert_ne!(admin.cookie, guest.cookie);

    let (_, a) = admin.get("/navigate?path=/quality").await;
    let (_, g) = guest.get("/navigate?path=/quality").await;
    assert_eq!(a["navigation"]["result"]["decision"], "allow");
    assert_eq!(g["navigation"]["result"]["decision"], "redirect_to_unauthorized");
}

#[tokio::test]
async fn sessions_survive_server_restart() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("sessions.json");

    let addr = serve(router(state_with(Arc::new(FileKv::open(&path).unwrap())))).await;
    let mut c = Client::new(addr);
    c.post("/session/login", json!({"email": "omar.khalil@nmc.ae", "password": "pw"})).await;
    let cookie = c.cookie.clone();

    // A second server over the same file knows nothing in memory but restores from disk
    let addr2 = serve(router(state_with(Arc::new(FileKv::open(&path).unwrap())))).await;
    let mut c2 = Client::new(addr2);
    c2.cookie = cookie;
    let (_, body) = c2.get("/session").await;
    assert_eq!(body["state"], "active");
    assert_eq!(body["identity"]["id"], "usr-003");

    // Unknown cookie: anonymous, nothing created
    let mut stranger = Client::new(addr2);
    stranger.cookie = Some("0000".into());
    let (_, body) = stranger.get("/session").await;
    assert_eq!(body["state"], "anonymous");
}

fn set_source_offline(state: &AppState, offline: bool) {
    match &*state.source {
        IdentityBackend::Fixture(f) => f.set_offline(offline),
        IdentityBackend::Http(_) => panic!("fixture source expected"),
    }
}

#[tokio::test]
async fn logout_after_restart_clears_stored_session_while_source_is_down() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("sessions.json");

    let addr = serve(router(state_with(Arc::new(FileKv::open(&path).unwrap())))).await;
    let mut c = Client::new(addr);
    c.post("/session/login", json!({"email": "ahmed.alrashid@nmc.ae", "password": "pw"})).await;
    let sid = c.cookie.clone().unwrap();

    let kv = Arc::new(FileKv::open(&path).unwrap());
    let restarted = state_with(kv.clone());
    set_source_offline(&restarted, true);
    let addr2 = serve(router(restarted.clone())).await;
    let mut c2 = Client::new(addr2);
    c2.cookie = Some(sid.clone());
    let (s, _) = c2.post("/session/logout", json!({})).await;
    assert_eq!(s, StatusCode::OK);
    assert!(kv.get(&session_key_for(&sid)).unwrap().is_none());

    set_source_offline(&restarted, false);
    c2.cookie = Some(sid);
    let (_, body) = c2.get("/session").await;
    assert_eq!(body["state"], "anonymous");
}

#[tokio::test]
async fn failed_cookieless_attempts_register_no_sessions() {
    let state = state_with(Arc::new(MemoryKv::new()));
    let addr = serve(router(state.clone())).await;
    let mut c = Client::new(addr);

    for _ in 0..20 {
        let (s, _) = c.post("/session/login", json!({"email": "nobody@nmc.ae", "password": "pw"})).await;
        assert_eq!(s, StatusCode::UNAUTHORIZED);
        let (s, _) = c.post("/session/switch", json!({"identity_id": "usr-999"})).await;
        assert_eq!(s, StatusCode::NOT_FOUND);
        assert!(c.cookie.is_none());
    }
    assert!(state.sessions.read().await.is_empty());

    c.post("/session/login", json!({"email": "visitor@nmc.ae", "password": "pw"})).await;
    assert_eq!(state.sessions.read().await.len(), 1);
}

#[tokio::test]
async fn login_rotates_the_session_id() {
    let kv = Arc::new(MemoryKv::new());
    let state = state_with(kv.clone());
    let addr = serve(router(state.clone())).await;
    let mut c = Client::new(addr);

    c.post("/session/login", json!({"email": "fatima.hassan@nmc.ae", "password": "pw"})).await;
    let first = c.cookie.clone().unwrap();
    let (s, _) = c.post("/session/login", json!({"email": "ahmed.alrashid@nmc.ae", "password": "pw"})).await;
    assert_eq!(s, StatusCode::OK);
    let second = c.cookie.clone().unwrap();
    assert_ne!(first, second);
    assert_eq!(state.sessions.read().await.len(), 1);
    assert!(kv.get(&session_key_for(&first)).unwrap().is_none());

    let (_, body) = c.get("/session").await;
    assert_eq!(body["identity"]["id"], "usr-001");

    // A failed login keeps the current session and its cookie
    let (s, _) = c.post("/session/login", json!({"email": "nobody@nmc.ae", "password": "pw"})).await;
    assert_eq!(s, StatusCode::UNAUTHORIZED);
    assert_eq!(c.cookie.as_deref(), Some(second.as_str()));
    let (_, body) = c.get("/session").await;
    assert_eq!(body["identity"]["id"], "usr-001");

    let mut stale = Client::new(addr);
    stale.cookie = Some(first);
    let (_, body) = stale.get("/session").await;
    assert_eq!(body["state"], "anonymous");
}

async fn fixture_identity(Path(id): Path<String>) -> Result<Json<IdentityRecord>, AxumStatus> {
    let src = FixtureIdentitySource::bundled().map_err(|_| AxumStatus::INTERNAL_SERVER_ERROR)?;
    match src.get_identity_by_id(&id).await {
        Ok(Some(r)) => Ok(Json(r)),
        Ok(None) => Err(AxumStatus::NOT_FOUND),
        Err(_) => Err(AxumStatus::SERVICE_UNAVAILABLE),
    }
}

async fn fixture_identities() -> Json<Vec<IdentityRecord>> {
    let src = FixtureIdentitySource::bundled().unwrap();
    Json(src.list_identities().await.unwrap())
}

#[tokio::test]
async fn http_identity_source_drives_a_session() {
    let user_service = Router::new()
        .route("/api/identities", get(fixture_identities))
        .route("/api/identities/{id}", get(fixture_identity));
    let addr = serve(user_service).await;

    let source = Arc::new(HttpIdentitySource::new(&format!("http://{}/api", addr)).unwrap());
    assert_eq!(source.list_identities().await.unwrap().len(), 4);
    assert!(source.get_identity_by_id("usr-404").await.unwrap().is_none());

    let store = SessionStore::open(source.clone(), Arc::new(MemoryKv::new())).await;
    let id = store.login("Omar.Khalil@nmc.ae", "pw").await.unwrap();
    assert_eq!(id.id, "usr-003");
    let admin = store.switch("usr-001").await.unwrap();
    assert!(admin.permissions.contains("system_settings"));
}
