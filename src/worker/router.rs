//! Request routing against the live partition
//!
//! Only GET requests for manifest resources are intercepted. The root
//! document is served online-first so a reachable server always wins, and
//! whatever the server answers replaces the cached copy. Every other
//! resource is served cache-first and filled lazily from ok responses.

use super::WorkerContext;
use crate::error::ShellCacheResult;
use crate::manifest::ROOT_KEY;
use crate::network::{CacheMode, FetchRequest, Request};
use crate::store::CachedResponse;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
}

/// Result of routing a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDisposition {
    /// Not intercepted, the runtime performs its default network fetch
    Bypass,
    /// Respond with this response
    Respond {
        response: CachedResponse,
        source: ResponseSource,
    },
}

impl FetchDisposition {
    /// The response, if the request was intercepted
    pub fn response(&self) -> Option<&CachedResponse> {
        match self {
            Self::Bypass => None,
            Self::Respond { response, .. } => Some(response),
        }
    }
}

/// Routing policy for an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Network first, fall back to cache
    OnlineFirst(String),
    /// Cache first, fill from network on a miss
    CacheFirst(String),
}

/// Serves manifest resources from the live partition
pub struct RequestRouter {
    ctx: Arc<WorkerContext>,
}

impl RequestRouter {
    pub(crate) fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Decide whether and how a request is intercepted
    pub fn classify(&self, request: &Request) -> Option<Route> {
        if !request.method.is_cacheable() {
            return None;
        }
        let key = self.ctx.origin.resource_key(&request.url)?;
        if !self.ctx.registry.contains(&key) {
            return None;
        }
        if key == ROOT_KEY {
            Some(Route::OnlineFirst(key))
        } else {
            Some(Route::CacheFirst(key))
        }
    }

    /// Route a request
    pub async fn route(&self, request: &Request) -> ShellCacheResult<FetchDisposition> {
        match self.classify(request) {
            None => {
                debug!("Bypassing {} {}", request.method, request.url);
                Ok(FetchDisposition::Bypass)
            }
            Some(Route::OnlineFirst(key)) => self.online_first(&key).await,
            Some(Route::CacheFirst(key)) => self.cache_first(&key).await,
        }
    }

    async fn online_first(&self, key: &str) -> ShellCacheResult<FetchDisposition> {
        let request = FetchRequest::for_key(&self.ctx.origin, key, CacheMode::Default);
        let live = self.ctx.storage.open(&self.ctx.partitions.live).await?;

        match self.ctx.fetcher.fetch(&request).await {
            Ok(response) => {
                live.put(key, response.clone()).await?;
                Ok(FetchDisposition::Respond {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(fetch_err) => match live.get(key).await? {
                Some(response) => {
                    warn!("Serving cached {} while offline: {}", key, fetch_err);
                    Ok(FetchDisposition::Respond {
                        response,
                        source: ResponseSource::Cache,
                    })
                }
                None => Err(fetch_err),
            },
        }
    }

    async fn cache_first(&self, key: &str) -> ShellCacheResult<FetchDisposition> {
        let live = self.ctx.storage.open(&self.ctx.partitions.live).await?;
        if let Some(response) = live.get(key).await? {
            debug!("Cache hit {}", key);
            return Ok(FetchDisposition::Respond {
                response,
                source: ResponseSource::Cache,
            });
        }

        debug!("Cache miss {}", key);
        let request = FetchRequest::for_key(&self.ctx.origin, key, CacheMode::Default);
        let response = self.ctx.fetcher.fetch(&request).await?;
        if response.is_ok() {
            live.put(key, response.clone()).await?;
        }
        Ok(FetchDisposition::Respond {
            response,
            source: ResponseSource::Network,
        })
    }
}
