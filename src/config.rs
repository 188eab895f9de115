//! `.cgrconfig` loading (§6, §10.4).
//!
//! A missing file or malformed YAML both silently yield defaults — this is
//! a deliberate part of the contract (§6: "Missing or malformed file
//! silently yields defaults"), not an oversight, so `load_config` never
//! returns an error.

use serde::Deserialize;
use std::path::Path;
use tracing::warn;

fn default_min_confidence() -> f64 {
    0.25
}

fn default_fuzzy_matching() -> bool {
    true
}

/// Configuration for the HTTP/async link inferencer, loaded from the
/// `http_linker` section of `.cgrconfig`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpLinkerConfig {
    pub exclude_paths: Vec<String>,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_fuzzy_matching")]
    pub fuzzy_matching: bool,
}

impl Default for HttpLinkerConfig {
    fn default() -> Self {
        Self {
            exclude_paths: Vec::new(),
            min_confidence: default_min_confidence(),
            fuzzy_matching: default_fuzzy_matching(),
        }
    }
}

/// Default paths excluded from link matching regardless of user config
/// (§4.9 step 2). `HttpLinkerConfig::exclude_paths` is appended to these,
/// never replaces them.
pub const DEFAULT_EXCLUDE_PATHS: &[&str] = &[
    "/health",
    "/healthz",
    "/ready",
    "/readyz",
    "/metrics",
    "/favicon.ico",
];

impl HttpLinkerConfig {
    /// The full exclude list: built-in defaults plus user-configured
    /// additions, normalised the same way the matcher normalises route
    /// paths (case-insensitive, trailing `/` stripped) for cheap
    /// comparison later.
    pub fn merged_exclude_paths(&self) -> Vec<String> {
        DEFAULT_EXCLUDE_PATHS
            .iter()
            .map(|s| s.to_string())
            .chain(self.exclude_paths.iter().cloned())
            .map(|p| normalize_for_exclude(&p))
            .collect()
    }
}

fn normalize_for_exclude(path: &str) -> String {
    let lower = path.to_lowercase();
    lower.strip_suffix('/').unwrap_or(&lower).to_string()
}

/// Top-level `.cgrconfig` document.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CgrConfig {
    pub http_linker: HttpLinkerConfig,
}

/// Load `<project_root>/.cgrconfig`. Never fails: a missing file or a YAML
/// parse error are both logged at `warn!` and answered with
/// [`CgrConfig::default`].
pub fn load_config(project_root: &Path) -> CgrConfig {
    let path = project_root.join(".cgrconfig");
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return CgrConfig::default(),
    };

    match serde_yaml::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed .cgrconfig, using defaults");
            CgrConfig::default()
        }
    }
}
