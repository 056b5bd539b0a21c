//! Offline download of the full manifest

use super::WorkerContext;
use crate::error::ShellCacheResult;
use crate::network::CacheMode;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Outcome of an offline download
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Keys fetched into live
    pub fetched: Vec<String>,
}

/// Fills the live partition with every manifest resource it lacks
pub struct OfflineSync {
    ctx: Arc<WorkerContext>,
}

impl OfflineSync {
    pub(crate) fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Manifest keys not yet present in live
    pub async fn missing(&self) -> ShellCacheResult<Vec<String>> {
        let live = self.ctx.storage.open(&self.ctx.partitions.live).await?;
        let present: HashSet<String> = live
            .keys()
            .await?
            .iter()
            .map(|k| self.ctx.origin.stored_key(k))
            .collect();

        Ok(self
            .ctx
            .registry
            .keys()
            .filter(|key| !present.contains(*key))
            .map(str::to_string)
            .collect())
    }

    /// Fetch and store every missing resource
    ///
    /// All or nothing: if any fetch fails, nothing is written.
    pub async fn run(&self) -> ShellCacheResult<SyncReport> {
        let missing = self.missing().await?;
        if missing.is_empty() {
            info!("Offline cache already complete");
            return Ok(SyncReport::default());
        }

        info!("Downloading {} resources for offline use", missing.len());
        let fetched = self.ctx.fetch_all(&missing, CacheMode::Default).await?;

        let live = self.ctx.storage.open(&self.ctx.partitions.live).await?;
        for (key, response) in fetched {
            live.put(&key, response).await?;
        }

        Ok(SyncReport { fetched: missing })
    }
}
