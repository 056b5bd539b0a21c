//! Cached response payloads

use crate::error::ShellCacheResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A response as stored in, and served from, a cache partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers, lowercase names
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Response body
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Create a 200 response holding a JSON document
    pub fn json<T: Serialize>(value: &T) -> ShellCacheResult<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(200, body).with_header("content-type", "application/json"))
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Whether the status indicates success (2xx)
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Decode the body as JSON
    pub fn parse_json<T: serde::de::DeserializeOwned>(&self) -> ShellCacheResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}
