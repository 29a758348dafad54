//! Store configuration schema and loading.
//!
//! Configuration lives in a TOML file (`refnet.toml`); every field has a
//! default so a missing file still yields a working client, and the base
//! URL / auth token can be overridden through the environment for
//! deployments that inject credentials that way.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment override for the store base URL.
pub const ENV_BASE_URL: &str = "REFNET_STORE_URL";
/// Environment override for the store auth token.
pub const ENV_AUTH_TOKEN: &str = "REFNET_STORE_AUTH";

/// Connection and traversal tuning for the record store.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the key-value backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional auth token appended to every request.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on concurrent record fetches during traversal.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_fetches: usize,

    /// Descent bound used by member-facing network views.
    #[serde(default = "default_max_depth")]
    pub default_max_depth: u32,
}

fn default_base_url() -> String {
    "http://localhost:9000/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    8
}

fn default_max_depth() -> u32 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            timeout_secs: default_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent(),
            default_max_depth: default_max_depth(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from a TOML file, then apply env overrides.
    /// A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides, no file involved.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(token) = std::env::var(ENV_AUTH_TOKEN) {
            if !token.is_empty() {
                self.auth_token = Some(token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_concurrent_fetches, 8);
        assert_eq!(config.default_max_depth, 10);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
base_url = "https://refnet-prod.example.com/"
auth_token = "secret"
max_concurrent_fetches = 4
"#;
        let config: StoreConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.base_url, "https://refnet-prod.example.com/");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.max_concurrent_fetches, 4);
        // Unspecified fields keep their defaults.
        assert_eq!(config.default_max_depth, 10);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = StoreConfig::load(Path::new("/nonexistent/refnet.toml")).unwrap();
        assert_eq!(config.timeout_secs, 30);
    }
}
