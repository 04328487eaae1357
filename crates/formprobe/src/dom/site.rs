//! A set of in-memory pages addressable by URL.

use super::Document;
use crate::result::{ProbeError, ProbeResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type PageBuilder = Arc<dyn Fn(&str) -> Document + Send + Sync>;

/// Page templates under one origin (`memory://name`)
///
/// Loading a URL builds a fresh [`Document`] from its template every time,
/// so no state survives navigation or leaks between sessions.
#[derive(Clone)]
pub struct Site {
    origin: String,
    pages: BTreeMap<String, PageBuilder>,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("origin", &self.origin)
            .field("pages", &self.pages.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Site {
    /// Empty site; `origin` has no trailing slash, e.g. `memory://csc`
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            pages: BTreeMap::new(),
        }
    }

    /// Register a page template at `path` (relative to the origin)
    ///
    /// The builder receives the absolute URL being loaded.
    #[must_use]
    pub fn page<F>(mut self, path: &str, build: F) -> Self
    where
        F: Fn(&str) -> Document + Send + Sync + 'static,
    {
        self.pages.insert(normalize_path(path), Arc::new(build));
        self
    }

    /// Origin
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Absolute URL for a path on this site
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.origin, normalize_path(path))
    }

    /// Registered paths
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.pages.keys().map(String::as_str).collect()
    }

    /// Build a fresh document for `url` and run its load hook
    pub fn load(&self, url: &str) -> ProbeResult<Document> {
        let rest = url
            .strip_prefix(self.origin.as_str())
            .filter(|r| r.is_empty() || r.starts_with('/'))
            .ok_or_else(|| ProbeError::driver(format!("{url} is not on {}", self.origin)))?;
        let path = rest.split(['?', '#']).next().unwrap_or_default();
        let builder = self
            .pages
            .get(&normalize_path(path))
            .ok_or_else(|| ProbeError::driver(format!("404 Not Found: {url}")))?;
        let mut doc = builder(url);
        if let Some(script) = doc.script() {
            script.on_load(&mut doc);
        }
        Ok(doc)
    }
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Resolve `href` against `base` the way a browser resolves link targets
#[must_use]
pub fn resolve_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.contains("://") || href.starts_with("about:") || href.starts_with("data:") {
        return href.to_string();
    }
    let base_no_fragment = base.split('#').next().unwrap_or(base);
    if href.is_empty() {
        return base_no_fragment.to_string();
    }
    if href.starts_with('#') {
        return format!("{base_no_fragment}{href}");
    }

    let (origin, base_path) = match base.find("://") {
        Some(scheme_end) => {
            let after = scheme_end + 3;
            match base[after..].find('/') {
                Some(slash) => base.split_at(after + slash),
                None => (base, ""),
            }
        }
        None => ("", base),
    };
    let base_path = base_path.split(['?', '#']).next().unwrap_or_default();

    let (path, suffix) = match href.find(['?', '#']) {
        Some(i) => href.split_at(i),
        None => (href, ""),
    };
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        let dir = base_path.rfind('/').map_or("", |i| &base_path[..=i]);
        format!("{dir}{path}")
    };
    let mut normalized = normalize_path(&joined);
    if path.ends_with('/') && !normalized.is_empty() {
        normalized.push('/');
    }
    format!("{origin}/{normalized}{suffix}")
}
