//! Resource manifest registry
//!
//! The build emits a JSON manifest mapping each resource path to a content
//! fingerprint, plus the ordered list of core shell resources that must be
//! staged before the worker can activate:
//!
//! ```json
//! {
//!   "resources": { "/": "30f4…", "index.html": "30f4…", "main.js": "ef60…" },
//!   "core": ["main.js", "index.html"]
//! }
//! ```
//!
//! The registry is loaded once at startup and never mutated. A new version
//! means a new process with a new manifest.

use crate::error::{ShellCacheError, ShellCacheResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Key of the application root
pub const ROOT_KEY: &str = "/";

/// Normalize a resource path into a manifest key
///
/// Leading slashes are dropped; the empty path and `/` map to [`ROOT_KEY`].
pub fn normalize_key(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        ROOT_KEY.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Mapping of resource key to content fingerprint
///
/// Serializes as a flat JSON object, which is also the format of the record
/// kept in the manifest partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest(BTreeMap<String, String>);

impl ResourceManifest {
    /// Build a manifest from `(key, fingerprint)` pairs, normalizing keys
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (normalize_key(k.as_ref()), v.into()))
                .collect(),
        )
    }

    /// Fingerprint recorded for a key
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether the manifest lists a key
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// All keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the manifest is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a cached key should be evicted when upgrading from `previous`
    ///
    /// A key survives only if this manifest still lists it with the same
    /// fingerprint the previous manifest recorded.
    pub fn is_stale(&self, previous: &ResourceManifest, key: &str) -> bool {
        match self.fingerprint(key) {
            None => true,
            Some(current) => previous.fingerprint(key) != Some(current),
        }
    }
}

/// Raw manifest file layout
#[derive(Debug, Deserialize)]
struct ManifestFile {
    resources: BTreeMap<String, String>,
    #[serde(default)]
    core: Vec<String>,
}

/// Immutable view of the current manifest and its core shell
#[derive(Debug, Clone)]
pub struct ManifestRegistry {
    manifest: ResourceManifest,
    core: Vec<String>,
}

impl ManifestRegistry {
    /// Build a registry, validating that the core shell is part of the manifest
    pub fn new(manifest: ResourceManifest, core: Vec<String>) -> ShellCacheResult<Self> {
        let core: Vec<String> = core.iter().map(|k| normalize_key(k)).collect();

        let mut seen = HashSet::new();
        for key in &core {
            if !manifest.contains(key) {
                return Err(ShellCacheError::manifest(format!(
                    "core resource {} is not listed in resources",
                    key
                )));
            }
            if !seen.insert(key.as_str()) {
                return Err(ShellCacheError::manifest(format!(
                    "core resource {} is listed twice",
                    key
                )));
            }
        }

        if manifest.0.values().any(|fingerprint| fingerprint.is_empty()) {
            return Err(ShellCacheError::manifest("empty fingerprint"));
        }

        Ok(Self { manifest, core })
    }

    /// Parse a registry from the JSON manifest format
    pub fn parse(content: &str) -> ShellCacheResult<Self> {
        let file: ManifestFile =
            serde_json::from_str(content).map_err(|e| ShellCacheError::manifest(e.to_string()))?;

        let mut manifest = BTreeMap::new();
        for (path, fingerprint) in file.resources {
            let key = normalize_key(&path);
            if let Some(existing) = manifest.insert(key.clone(), fingerprint.clone()) {
                if existing != fingerprint {
                    return Err(ShellCacheError::manifest(format!(
                        "resource {} is listed with conflicting fingerprints",
                        key
                    )));
                }
            }
        }

        Self::new(ResourceManifest(manifest), file.core)
    }

    /// Load a registry from a JSON file on disk
    pub async fn from_file(path: &Path) -> ShellCacheResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ShellCacheError::io(format!("reading manifest {}", path.display()), e)
        })?;
        Self::parse(&content)
    }

    /// The full resource manifest
    pub fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    /// Core shell keys, in staging order
    pub fn core_shell(&self) -> &[String] {
        &self.core
    }

    pub fn lookup_fingerprint(&self, key: &str) -> Option<&str> {
        self.manifest.fingerprint(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.manifest.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.manifest.keys()
    }

    pub fn len(&self) -> usize {
        self.manifest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.is_empty()
    }
}
