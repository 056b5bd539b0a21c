//! CLI command implementations

pub mod clear;
pub mod completions;
pub mod config;
pub mod fetch;
pub mod lifecycle;
pub mod message;
pub mod status;

pub use clear::execute as clear;
pub use completions::execute as completions;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use lifecycle::{activate, install, upgrade};
pub use message::execute as message;
pub use status::execute as status;

use crate::config::{Config, ConfigManager};
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::journal::Journal;
use crate::manifest::ManifestRegistry;
use crate::network::{HttpFetcher, Origin};
use crate::store::{DiskStore, PartitionNames};
use crate::worker::CacheWorker;
use std::sync::Arc;
use tracing::debug;

/// Build a worker over the on-disk store and restore its lifecycle state
pub(crate) async fn build_worker(config: &Config) -> ShellCacheResult<CacheWorker> {
    let manifest_path = config
        .manifest
        .path
        .as_deref()
        .ok_or(ShellCacheError::ManifestNotConfigured)?;
    let registry = ManifestRegistry::from_file(manifest_path).await?;
    let origin = Origin::parse(&config.origin.url)?;
    let partitions = PartitionNames::from_config(&config.store)?;

    let root = ConfigManager::store_root(config);
    debug!("Using store at {}", root.display());

    let worker = CacheWorker::builder(
        registry,
        origin,
        Arc::new(DiskStore::new(root)),
        Arc::new(HttpFetcher::new(&config.network)),
    )
    .partitions(partitions)
    .journal(Journal::new(config))
    .max_concurrent_fetches(config.network.max_concurrent_fetches)
    .build();

    let state = worker.recover().await?;
    debug!("Worker {} starts {}", worker.id(), state);
    Ok(worker)
}
