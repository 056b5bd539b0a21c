//! Network access for the worker
//!
//! The worker never talks to the network directly; it goes through the
//! [`Fetcher`] trait so the HTTP client can be swapped (and scripted in tests).

mod http;
mod origin;

pub use http::HttpFetcher;
pub use origin::Origin;

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::store::CachedResponse;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Whether requests with this method are candidates for the cache
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl FromStr for Method {
    type Err = ShellCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(ShellCacheError::User(format!("Unknown method: {}", other))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        };
        write!(f, "{}", name)
    }
}

/// A request delivered to the worker by the hosting runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    /// Convenience constructor for a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }
}

/// How a fetch treats intermediate HTTP caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Normal fetch
    #[default]
    Default,
    /// Bypass intermediate caches and revalidate with the server
    Reload,
}

/// An outgoing fetch for a single resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Resource key the response will be stored under
    pub key: String,
    /// Absolute URL
    pub url: String,
    pub mode: CacheMode,
}

impl FetchRequest {
    /// Fetch a manifest key from the origin
    pub fn for_key(origin: &Origin, key: &str, mode: CacheMode) -> Self {
        Self {
            key: key.to_string(),
            url: origin.url_for(key),
            mode,
        }
    }
}

/// Network client interface
///
/// Any response the server produces, whatever its status, is `Ok`. Only
/// transport failures (unreachable host, reset connection, timeout) are
/// errors.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> ShellCacheResult<CachedResponse>;
}
