//!
//! cdsgate server binary
//! ---------------------
//! Starts the HTTP API over the session store, route guard and menu filter.
//! Configuration comes from CLI flags and environment variables (see `GateConfig`).

use std::env;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use cdsgate::config::{has_flag, GateConfig};

const HELP: &str = "cdsgate server\n\nUSAGE:\n  cdsgate [--http-port N] [--state-dir PATH] [--identities FILE | --identity-url URL] [--nav FILE] [--credentials demo|argon2]\n\nOPTIONS:\n  --http-port N         HTTP API port (env: CDSGATE_HTTP_PORT, default 7880)\n  --state-dir PATH      Folder for persisted sessions (env: CDSGATE_STATE_DIR, default state)\n  --identities FILE     Identity fixtures JSON (env: CDSGATE_IDENTITIES, default bundled demo users)\n  --identity-url URL    Remote identity service; overrides --identities (env: CDSGATE_IDENTITY_URL)\n  --nav FILE            Route and menu table JSON (env: CDSGATE_NAV, default bundled dashboard)\n  --credentials MODE    demo (any non-empty password) or argon2 (env: CDSGATE_CREDENTIALS, default demo)\n";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("{}", HELP);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let config = GateConfig::from_env_and_args(&args);
    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "cdsgate starting: RUST_LOG='{}', http_port={}, state_dir='{}', credentials={:?}",
        rust_log, config.http_port, config.state_dir.display(), config.credentials
    );

    cdsgate::server::run(config).await
}
