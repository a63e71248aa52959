//! Route table: resolves concrete paths to route descriptors and keeps the menu
//! consistent with the routes it links to.
//!
//! Pattern syntax, per `/`-separated segment:
//! - literal text
//! - `:name` matches exactly one segment
//! - `*` inside a segment matches any run of non-`/` characters
//! - `**` as the last segment matches the prefix itself and anything below it
//!
//! Query strings, fragments and trailing slashes are ignored. First match wins.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::guard::{authorize_request, Decision, RouteDescriptor};
use super::navigation::{visible_items, MenuItem};
use crate::identity::Identity;

const BUNDLED_NAV: &str = include_str!("../../fixtures/nav.json");

/// Strip query/fragment, force a leading `/`, drop trailing `/` (except for the root).
pub fn normalize_path(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim().trim_end_matches('/');
    if trimmed.is_empty() { return "/".to_string(); }
    if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{}", trimmed) }
}

fn pattern_to_regex(pattern: &str) -> Result<Regex> {
    let norm = normalize_path(pattern);
    let segments: Vec<&str> = norm.split('/').filter(|s| !s.is_empty()).collect();
    let mut out = String::from("^");
    for (i, seg) in segments.iter().enumerate() {
        if *seg == "**" {
            if i + 1 != segments.len() { return Err(anyhow!("'**' must be the last segment in '{}'", pattern)); }
            out.push_str("(?:/.*)?");
            continue;
        }
        out.push('/');
        if let Some(name) = seg.strip_prefix(':') {
            if name.is_empty() { return Err(anyhow!("unnamed parameter in '{}'", pattern)); }
            out.push_str("[^/]+");
        } else {
            out.push_str(&regex::escape(seg).replace("\\*", "[^/]*"));
        }
    }
    if segments.is_empty() { out.push('/'); }
    out.push('$');
    Regex::new(&out).with_context(|| format!("compiling route pattern '{}'", pattern))
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    route: RouteDescriptor,
    matcher: Regex,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDescriptor>) -> Result<Self> {
        let mut entries = Vec::with_capacity(routes.len());
        for route in routes {
            let matcher = pattern_to_regex(&route.path)?;
            entries.push(CompiledRoute { route, matcher });
        }
        Ok(Self { entries })
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteDescriptor> {
        let norm = normalize_path(path);
        self.entries.iter().find(|e| e.matcher.is_match(&norm)).map(|e| &e.route)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.entries.iter().map(|e| &e.route)
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// Serialized form of the route and menu configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavTable {
    #[serde(default)]
    pub routes: Vec<RouteDescriptor>,
    #[serde(default)]
    pub menu: Vec<MenuItem>,
}

impl NavTable {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid navigation table JSON")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading navigation table from {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Routes and sidebar of the clinical decision support dashboard.
    pub fn dashboard() -> Result<Self> {
        Self::from_json_str(BUNDLED_NAV)
    }
}

/// Validated routes + menu.
#[derive(Debug, Clone)]
pub struct SiteMap {
    routes: RouteTable,
    menu: Vec<MenuItem>,
}

impl SiteMap {
    /// Fails if a menu item links to no route, or gates differently from the route
    /// it links to.
    pub fn build(table: NavTable) -> Result<Self> {
        let routes = RouteTable::new(table.routes)?;
        let mut problems: Vec<String> = Vec::new();
        for item in &table.menu {
            match routes.resolve(&item.path) {
                None => problems.push(format!("menu item '{}' links to unknown path {}", item.label, item.path)),
                Some(route) if route.requires != item.requires => problems.push(format!(
                    "menu item '{}' gates differently from route {}",
                    item.label, route.path
                )),
                Some(_) => {}
            }
        }
        if !problems.is_empty() {
            return Err(anyhow!("inconsistent navigation table: {}", problems.join("; ")));
        }
        Ok(Self { routes, menu: table.menu })
    }

    pub fn dashboard() -> Result<Self> {
        Self::build(NavTable::dashboard()?)
    }

    pub fn routes(&self) -> &RouteTable { &self.routes }

    pub fn menu(&self) -> &[MenuItem] { &self.menu }

    pub fn route_for(&self, path: &str) -> Option<&RouteDescriptor> { self.routes.resolve(path) }

    /// Guard decision for a concrete path; `None` when no route matches.
    pub fn authorize_path(&self, identity: Option<&Identity>, path: &str) -> Option<Decision> {
        self.routes.resolve(path).map(|route| authorize_request(identity, route, path))
    }

    pub fn visible_menu(&self, identity: Option<&Identity>) -> Vec<&MenuItem> {
        visible_items(identity, &self.menu)
    }
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod routes_tests;
