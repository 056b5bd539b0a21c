//! HTTP fetcher backed by ureq

use super::{CacheMode, FetchRequest, Fetcher};
use crate::config::schema::NetworkConfig;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::store::CachedResponse;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Upper bound on a single response body
const MAX_BODY_BYTES: u64 = 512 * 1024 * 1024;

/// Fetcher that performs real HTTP requests
///
/// ureq is blocking, so each request runs on tokio's blocking pool.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: Agent,
    user_agent: String,
}

impl HttpFetcher {
    /// Build a fetcher from network settings
    pub fn new(config: &NetworkConfig) -> Self {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        let agent: Agent = Agent::config_builder()
            .timeout_global(timeout)
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }

    fn fetch_blocking(
        agent: &Agent,
        user_agent: &str,
        request: &FetchRequest,
    ) -> Result<CachedResponse, ureq::Error> {
        let mut builder = agent.get(&request.url).header("User-Agent", user_agent);
        if request.mode == CacheMode::Reload {
            builder = builder
                .header("Cache-Control", "no-cache")
                .header("Pragma", "no-cache");
        }

        let mut response = builder.call()?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()?;

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> ShellCacheResult<CachedResponse> {
        debug!("GET {} ({:?})", request.url, request.mode);

        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let owned = request.clone();
        let result =
            tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &user_agent, &owned))
                .await
                .map_err(|e| ShellCacheError::Internal(format!("fetch task failed: {}", e)))?;

        let response = result.map_err(|e| ShellCacheError::fetch(&request.url, e))?;
        debug!("{} -> {}", request.url, response.status);
        Ok(response)
    }
}
