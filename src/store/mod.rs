//! Persistent cache store abstraction
//!
//! A store holds named partitions, each an independent collection of
//! `key -> CachedResponse` entries. Opening a partition creates it.
//!
//! # Partitions
//!
//! | Partition | Role |
//! |-----------|------|
//! | staging | Shell resources fetched during install, promoted on activate |
//! | live | Serves traffic, mutated incrementally across upgrades |
//! | manifest | Single record: the last activated manifest |
//!
//! Every operation may fail with a store error. Callers must assume a
//! sequence of operations can stop anywhere and design for re-application.

mod disk;
mod memory;
mod response;

pub use disk::DiskStore;
pub use memory::MemoryStore;
pub use response::CachedResponse;

use crate::config::schema::StoreConfig;
use crate::error::{ShellCacheError, ShellCacheResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Abstract persistent cache storage
///
/// Implemented by the in-process `MemoryStore` and the directory-backed
/// `DiskStore`.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a partition, creating it if missing
    async fn open(&self, name: &str) -> ShellCacheResult<Arc<dyn Partition>>;

    /// Delete a partition and all its entries. Returns whether it existed.
    async fn delete_partition(&self, name: &str) -> ShellCacheResult<bool>;

    /// Names of all existing partitions
    async fn partition_names(&self) -> ShellCacheResult<Vec<String>>;
}

/// A single named partition
#[async_trait]
pub trait Partition: Send + Sync {
    /// Partition name
    fn name(&self) -> &str;

    /// Look up an entry by exact key
    async fn get(&self, key: &str) -> ShellCacheResult<Option<CachedResponse>>;

    /// Store an entry, replacing any previous one under the same key
    async fn put(&self, key: &str, response: CachedResponse) -> ShellCacheResult<()>;

    /// Delete an entry. Returns whether it existed.
    async fn delete(&self, key: &str) -> ShellCacheResult<bool>;

    /// All keys currently stored
    async fn keys(&self) -> ShellCacheResult<Vec<String>>;
}

/// Names of the three partitions used by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    pub staging: String,
    pub live: String,
    pub manifest: String,
    pub manifest_key: String,
}

impl PartitionNames {
    /// Take partition names from the store config
    pub fn from_config(config: &StoreConfig) -> ShellCacheResult<Self> {
        for name in [&config.staging, &config.live, &config.manifest] {
            validate_partition_name(name)?;
        }
        if config.staging == config.live
            || config.staging == config.manifest
            || config.live == config.manifest
        {
            return Err(ShellCacheError::User(
                "store.staging, store.live and store.manifest must be distinct".to_string(),
            ));
        }
        Ok(Self {
            staging: config.staging.clone(),
            live: config.live.clone(),
            manifest: config.manifest.clone(),
            manifest_key: config.manifest_key.clone(),
        })
    }

    /// All partition names, in teardown order
    pub fn all(&self) -> [&str; 3] {
        [&self.live, &self.staging, &self.manifest]
    }
}

impl Default for PartitionNames {
    fn default() -> Self {
        let config = StoreConfig::default();
        Self {
            staging: config.staging,
            live: config.live,
            manifest: config.manifest,
            manifest_key: config.manifest_key,
        }
    }
}

/// Reject partition names that cannot be used as a single path component
pub(crate) fn validate_partition_name(name: &str) -> ShellCacheResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ShellCacheError::InvalidPartitionName(name.to_string()));
    }
    Ok(())
}
