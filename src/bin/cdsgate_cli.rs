//!
//! cdsgate CLI binary
//! ------------------
//! Interactive interpreter over a local session store. Useful to walk through the
//! dashboard's access rules as different users without running the HTTP server.
//! The session is persisted in `<state_dir>/session.json`, so `whoami` after a
//! restart shows the restored identity.

use std::env;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use cdsgate::access::SiteMap;
use cdsgate::config::{has_flag, GateConfig};
use cdsgate::identity::{IdentityBackend, IdentitySource, Navigation, SessionState, SessionStore};
use cdsgate::storage::FileKv;
use cdsgate::Decision;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--state-dir PATH] [--identities FILE | --identity-url URL] [--nav FILE] [--credentials demo|argon2]\n\nInteractive commands:\n  identities                 list identities known to the identity source\n  login <email> <password>   log in\n  switch <identity_id>       become another identity without logging out\n  logout                     end the session\n  whoami                     show the session state\n  menu                       list the menu items visible to the current identity\n  go <path>                  navigate to a path and show the guard decision\n  help                       show this help\n  quit | exit                exit the interpreter\n\nConfiguration flags and CDSGATE_* environment variables are shared with the server."
    );
}

/// One interpreter command's effect on the loop.
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue(String),
    Quit,
}

struct Interpreter {
    store: SessionStore<IdentityBackend>,
    source: Arc<IdentityBackend>,
    site: SiteMap,
}

impl Interpreter {
    async fn exec(&self, line: &str) -> Step {
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or("").to_ascii_lowercase();
        let rest: Vec<&str> = parts.collect();
        let out = match cmd.as_str() {
            "quit" | "exit" => return Step::Quit,
            "help" => "commands: identities, login, switch, logout, whoami, menu, go, help, quit".to_string(),
            "identities" => match self.source.list_identities().await {
                Ok(records) => records
                    .iter()
                    .map(|r| format!("{:<10} {:<8} {:<28} {}", r.id, r.role, r.email, r.name))
                    .collect::<Vec<_>>()
                    .join("\n"),
                Err(e) => format!("error: {}", e),
            },
            "login" => match rest.as_slice() {
                [email, password] => match self.store.login(email, password).await {
                    Ok(id) => format!("logged in as {} ({})", id.id, id.role),
                    Err(e) => format!("error: {}", e),
                },
                _ => "usage: login <email> <password>".to_string(),
            },
            "switch" => match rest.as_slice() {
                [id] => match self.store.switch(id).await {
                    Ok(id) => format!("switched to {} ({})", id.id, id.role),
                    Err(e) => format!("error: {}", e),
                },
                _ => "usage: switch <identity_id>".to_string(),
            },
            "logout" => {
                self.store.logout();
                "logged out".to_string()
            }
            "whoami" => match self.store.state() {
                SessionState::Active(id) => {
                    let mut perms: Vec<&str> = id.permissions.iter().map(|p| p.as_str()).collect();
                    perms.sort_unstable();
                    format!("{} <{}> role={} permissions=[{}]", id.profile.name, id.email(), id.role, perms.join(", "))
                }
                SessionState::Anonymous => "not logged in".to_string(),
                SessionState::Loading => "loading".to_string(),
            },
            "menu" => match self.store.visible_menu(&self.site) {
                None => "loading".to_string(),
                Some(items) if items.is_empty() => "(no menu items)".to_string(),
                Some(items) => items.iter().map(|m| format!("{:<26} {}", m.label, m.path)).collect::<Vec<_>>().join("\n"),
            },
            "go" => match rest.as_slice() {
                [path] => match self.store.navigate_path(&self.site, path) {
                    None => format!("404: no route matches {}", path),
                    Some(Navigation::Pending) => "pending: session is resolving".to_string(),
                    Some(Navigation::Ready(Decision::Allow)) => format!("allowed: {}", path),
                    Some(Navigation::Ready(d)) => {
                        let reason = match &d {
                            Decision::RedirectToUnauthorized { denial } => format!(" ({})", denial),
                            _ => String::new(),
                        };
                        format!("redirect: {}{}", d.redirect_location().unwrap_or_default(), reason)
                    }
                },
                _ => "usage: go <path>".to_string(),
            },
            other => format!("unknown command '{}'; type 'help'", other),
        };
        Step::Continue(out)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().collect();
    let program = if args.is_empty() { "cdsgate_cli".to_string() } else { args.remove(0) };
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage(&program);
        return Ok(());
    }

    // Interpreter output goes to stdout; logs stay quiet unless RUST_LOG asks
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).try_init();

    let config = GateConfig::from_env_and_args(&args);
    std::fs::create_dir_all(&config.state_dir)?;
    let source = config.identity_backend()?;
    let site = config.site_map()?;
    let kv = Arc::new(FileKv::open(config.local_session_file())?);
    let store = SessionStore::new(source.clone(), kv).with_policy(config.credentials);
    if let Err(e) = store.restore().await {
        eprintln!("could not restore previous session: {}", e);
    }
    let interp = Interpreter { store, source, site };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    println!("cdsgate interpreter. Type 'help' for commands.");
    loop {
        input.clear();
        print!("cdsgate> ");
        let _ = stdout.flush();
        match stdin.read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = input.trim();
        if line.is_empty() { continue; }
        match interp.exec(line).await {
            Step::Quit => break,
            Step::Continue(out) => println!("{}", out),
        }
    }
    Ok(())
}
