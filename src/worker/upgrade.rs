//! Install and activate phases
//!
//! Install stages the core shell into the staging partition, together with
//! the manifest it was fetched for. Activate then promotes it into the live
//! partition:
//!
//! 1. check that staging is complete and was staged for this manifest
//! 2. read the previously activated manifest
//! 3. cold start (no manifest): rebuild live from empty
//!    upgrade: evict live entries that were removed or changed
//! 4. copy every staged entry into live
//! 5. record the new manifest
//! 6. delete staging
//!
//! Any failure during activation tears down all three partitions. The next
//! install then finds no manifest and performs a cold start, so live is
//! never left half migrated.

use super::WorkerContext;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::manifest::ResourceManifest;
use crate::network::CacheMode;
use crate::store::{CachedResponse, Partition};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Staging key of the manifest the staged shell belongs to. Manifest keys
/// never start with a slash apart from the root, so it cannot collide.
const STAGED_MANIFEST_KEY: &str = "/.staged-manifest";

/// Staged resource keys, without the staged manifest record
pub(crate) async fn staged_keys(staging: &dyn Partition) -> ShellCacheResult<Vec<String>> {
    let mut keys = staging.keys().await?;
    keys.retain(|key| key != STAGED_MANIFEST_KEY);
    Ok(keys)
}

/// Outcome of a successful activation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// No previous manifest existed; live was rebuilt from empty
    pub cold_start: bool,
    /// Resource keys evicted from live
    pub evicted: Vec<String>,
    /// Live entries that survived eviction
    pub retained: usize,
    /// Entries copied from staging into live
    pub promoted: usize,
}

/// Drives the staging and activation phases
pub struct UpgradeCoordinator {
    ctx: Arc<WorkerContext>,
}

impl UpgradeCoordinator {
    pub(crate) fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx }
    }

    /// Fetch every core shell resource, bypassing HTTP caches, into staging
    ///
    /// Nothing is written unless every fetch succeeds. Staging from an
    /// earlier cycle is replaced, and the manifest record is written last.
    /// Returns the number of staged resources.
    pub async fn stage(&self) -> ShellCacheResult<usize> {
        let core = self.ctx.registry.core_shell();
        let name = &self.ctx.partitions.staging;
        info!("Staging {} core shell resources", core.len());

        let fetched = self.ctx.fetch_all(core, CacheMode::Reload).await?;

        if self.ctx.storage.delete_partition(name).await? {
            debug!("Discarded previous staging partition");
        }
        let staging = self.ctx.storage.open(name).await?;
        for (key, response) in fetched {
            staging.put(&key, response).await?;
        }
        staging
            .put(
                STAGED_MANIFEST_KEY,
                CachedResponse::json(self.ctx.registry.manifest())?,
            )
            .await?;

        info!("Staged {} resources", core.len());
        Ok(core.len())
    }

    /// Promote staging into live, tearing everything down on failure
    pub async fn activate(&self) -> ShellCacheResult<ActivationReport> {
        match self.promote().await {
            Ok(report) => Ok(report),
            Err(err) => {
                error!("Failed to upgrade cache: {}", err);
                if let Err(teardown_err) = self.teardown().await {
                    warn!("Teardown incomplete: {}", teardown_err);
                }
                Err(ShellCacheError::ActivationFailed {
                    source: Box::new(err),
                })
            }
        }
    }

    /// Delete the live, staging and manifest partitions
    ///
    /// Attempts every partition even if one fails, then reports the first
    /// failure.
    pub async fn teardown(&self) -> ShellCacheResult<()> {
        let mut first_error = None;
        for name in self.ctx.partitions.all() {
            match self.ctx.storage.delete_partition(name).await {
                Ok(existed) => debug!("Deleted partition {} (existed: {})", name, existed),
                Err(e) => {
                    warn!("Failed to delete partition {}: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Read the manifest recorded by the last successful activation
    pub async fn previous_manifest(&self) -> ShellCacheResult<Option<ResourceManifest>> {
        let names = &self.ctx.partitions;
        let manifest_store = self.ctx.storage.open(&names.manifest).await?;
        match manifest_store.get(&names.manifest_key).await? {
            Some(record) => Ok(Some(record.parse_json()?)),
            None => Ok(None),
        }
    }

    /// Whether staging was staged for this worker's manifest
    ///
    /// An unreadable record counts as a mismatch.
    pub(crate) async fn staged_for_current(
        &self,
        staging: &dyn Partition,
    ) -> ShellCacheResult<bool> {
        let staged = match staging.get(STAGED_MANIFEST_KEY).await? {
            Some(record) => match record.parse_json::<ResourceManifest>() {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    warn!("Ignoring unreadable staged manifest: {}", e);
                    None
                }
            },
            None => None,
        };
        Ok(staged.as_ref() == Some(self.ctx.registry.manifest()))
    }

    /// Find the first core shell key missing from staging
    pub(crate) async fn missing_core(
        &self,
        staging: &dyn Partition,
    ) -> ShellCacheResult<Option<String>> {
        let staged: HashSet<String> = staged_keys(staging)
            .await?
            .iter()
            .map(|k| self.ctx.origin.stored_key(k))
            .collect();
        Ok(self
            .ctx
            .registry
            .core_shell()
            .iter()
            .find(|key| !staged.contains(*key))
            .cloned())
    }

    async fn promote(&self) -> ShellCacheResult<ActivationReport> {
        let names = &self.ctx.partitions;
        let storage = &self.ctx.storage;

        let mut live = storage.open(&names.live).await?;
        let staging = storage.open(&names.staging).await?;
        let manifest_store = storage.open(&names.manifest).await?;

        if let Some(missing) = self.missing_core(&*staging).await? {
            return Err(ShellCacheError::StagingIncomplete(missing));
        }
        if !self.staged_for_current(&*staging).await? {
            return Err(ShellCacheError::StagingMismatch);
        }

        let previous = match manifest_store.get(&names.manifest_key).await? {
            Some(record) => Some(record.parse_json::<ResourceManifest>()?),
            None => None,
        };
        let current = self.ctx.registry.manifest();
        let mut report = ActivationReport::default();

        match previous {
            None => {
                info!("No previous manifest, rebuilding live cache");
                storage.delete_partition(&names.live).await?;
                live = storage.open(&names.live).await?;
                report.cold_start = true;
            }
            Some(previous) => {
                for stored in live.keys().await? {
                    let key = self.ctx.origin.stored_key(&stored);
                    if current.is_stale(&previous, &key) {
                        debug!("Evicting {}", key);
                        live.delete(&stored).await?;
                        report.evicted.push(key);
                    } else {
                        report.retained += 1;
                    }
                }
            }
        }

        // Staging is authoritative for shell resources
        for key in staged_keys(&*staging).await? {
            let response = staging.get(&key).await?.ok_or_else(|| {
                ShellCacheError::store("get", &names.staging, format!("entry {} vanished", key))
            })?;
            live.put(&key, response).await?;
            report.promoted += 1;
        }

        manifest_store
            .put(&names.manifest_key, CachedResponse::json(current)?)
            .await?;
        storage.delete_partition(&names.staging).await?;

        info!(
            "Activated: {} promoted, {} retained, {} evicted{}",
            report.promoted,
            report.retained,
            report.evicted.len(),
            if report.cold_start { " (cold start)" } else { "" }
        );
        Ok(report)
    }
}
