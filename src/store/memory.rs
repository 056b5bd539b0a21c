//! In-process cache storage

use super::{validate_partition_name, CacheStorage, CachedResponse, Partition};
use crate::error::ShellCacheResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

type Entries = Arc<RwLock<BTreeMap<String, CachedResponse>>>;

/// Storage that keeps every partition in memory
///
/// Deleting a partition detaches existing handles: they keep working on
/// their own entries, but a later `open` starts from empty.
#[derive(Default, Clone)]
pub struct MemoryStore {
    partitions: Arc<RwLock<HashMap<String, Entries>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStore {
    async fn open(&self, name: &str) -> ShellCacheResult<Arc<dyn Partition>> {
        validate_partition_name(name)?;
        let mut partitions = self.partitions.write().await;
        let entries = partitions.entry(name.to_string()).or_default().clone();
        Ok(Arc::new(MemoryPartition {
            name: name.to_string(),
            entries,
        }))
    }

    async fn delete_partition(&self, name: &str) -> ShellCacheResult<bool> {
        Ok(self.partitions.write().await.remove(name).is_some())
    }

    async fn partition_names(&self) -> ShellCacheResult<Vec<String>> {
        let mut names: Vec<String> = self.partitions.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

struct MemoryPartition {
    name: String,
    entries: Entries,
}

#[async_trait]
impl Partition for MemoryPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> ShellCacheResult<Option<CachedResponse>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, response: CachedResponse) -> ShellCacheResult<()> {
        self.entries.write().await.insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShellCacheResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> ShellCacheResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
