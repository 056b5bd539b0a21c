//! Application origin and request key normalization

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::manifest::{normalize_key, ROOT_KEY};
use std::fmt;
use std::str::FromStr;

/// Query suffix the build appends to bust intermediate caches
const VERSION_QUERY: &str = "?v=";

/// The origin the application is served from, e.g. `https://app.example.com`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin(String);

impl Origin {
    /// Parse an origin URL. A trailing slash is dropped.
    pub fn parse(url: &str) -> ShellCacheResult<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let invalid = |reason: &str| ShellCacheError::InvalidOrigin {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let rest = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| invalid("must start with http:// or https://"))?;
        if rest.is_empty() {
            return Err(invalid("missing host"));
        }
        if rest.contains(['?', '#']) {
            return Err(invalid("must not contain a query or fragment"));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Absolute URL of a resource key
    pub fn url_for(&self, key: &str) -> String {
        if key == ROOT_KEY {
            format!("{}/", self.0)
        } else {
            format!("{}/{}", self.0, key.trim_start_matches('/'))
        }
    }

    /// Map a request URL to its resource key
    ///
    /// Accepts absolute URLs on this origin and origin-relative paths starting
    /// with `/`. The `?v=` cache-busting suffix is stripped, and the bare
    /// origin or a fragment-anchored root (`/#/route`) maps to the root key.
    /// Returns `None` for URLs on another origin.
    pub fn resource_key(&self, url: &str) -> Option<String> {
        let rest = if url.starts_with('/') {
            url
        } else {
            let rest = url.strip_prefix(self.0.as_str())?;
            if !(rest.is_empty() || rest.starts_with(['/', '?', '#'])) {
                return None;
            }
            rest
        };

        if rest.is_empty() || rest.starts_with('#') || rest.starts_with("/#") {
            return Some(ROOT_KEY.to_string());
        }

        let path = rest.strip_prefix('/').unwrap_or(rest);
        let path = match path.find(VERSION_QUERY) {
            Some(idx) => &path[..idx],
            None => path,
        };
        Some(normalize_key(path))
    }

    /// Map a key read back from a partition to its resource key
    ///
    /// Partitions written by this crate hold resource keys already; absolute
    /// URLs on this origin are accepted as well.
    pub fn stored_key(&self, key: &str) -> String {
        match key.strip_prefix(self.0.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => normalize_key(rest),
            _ => normalize_key(key),
        }
    }
}

impl FromStr for Origin {
    type Err = ShellCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
