//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Application origin
    pub origin: OriginConfig,

    /// Resource manifest input
    pub manifest: ManifestConfig,

    /// Persistent cache store layout
    pub store: StoreConfig,

    /// Network client settings
    pub network: NetworkConfig,
}

impl Config {
    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got {:?}",
                self.general.log_format
            ));
        }
        if self.network.max_concurrent_fetches == 0 {
            return Err("network.max_concurrent_fetches must be at least 1".to_string());
        }
        if self.store.manifest_key.is_empty() {
            return Err("store.manifest_key must not be empty".to_string());
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,

    /// Record lifecycle events in the journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Origin the cached application is served from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL, e.g. `https://app.example.com`
    pub url: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
        }
    }
}

/// Manifest input settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// JSON manifest produced by the build (`{"resources": {...}, "core": [...]}`)
    pub path: Option<PathBuf>,
}

/// Store layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store root directory (defaults to the state directory)
    pub root: Option<PathBuf>,

    /// Partition holding freshly staged shell resources
    pub staging: String,

    /// Partition serving traffic
    pub live: String,

    /// Partition holding the last activated manifest
    pub manifest: String,

    /// Key of the manifest record inside the manifest partition
    pub manifest_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: None,
            staging: "app-temp-cache".to_string(),
            live: "app-cache".to_string(),
            manifest: "app-manifest".to_string(),
            manifest_key: "manifest".to_string(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds (0 = no timeout)
    pub timeout_secs: u64,

    /// Maximum fetches in flight during staging and offline sync
    pub max_concurrent_fetches: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_concurrent_fetches: 8,
            user_agent: format!("shellcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
