//! Directory-backed cache storage
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<partition>/<sha256(key)>.entry
//! ```
//!
//! Each entry file is one JSON metadata line (key, status, headers)
//! followed by the raw body. Entries are written to a temporary file and
//! renamed into place, so a reader sees either the previous entry or the
//! new one, never a torn write.

use super::{validate_partition_name, CacheStorage, CachedResponse, Partition};
use crate::error::{ShellCacheError, ShellCacheResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use uuid::Uuid;

const ENTRY_EXT: &str = "entry";

/// Storage that keeps each partition in its own directory
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl CacheStorage for DiskStore {
    async fn open(&self, name: &str) -> ShellCacheResult<Arc<dyn Partition>> {
        validate_partition_name(name)?;
        let dir = self.partition_dir(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ShellCacheError::store("open", name, e))?;
        Ok(Arc::new(DiskPartition {
            name: name.to_string(),
            dir,
        }))
    }

    async fn delete_partition(&self, name: &str) -> ShellCacheResult<bool> {
        validate_partition_name(name)?;
        match fs::remove_dir_all(self.partition_dir(name)).await {
            Ok(()) => {
                debug!("Deleted partition {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShellCacheError::store("delete partition", name, e)),
        }
    }

    async fn partition_names(&self) -> ShellCacheResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(ShellCacheError::store("list partitions", "*", e)),
        };

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ShellCacheError::store("list partitions", "*", e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Metadata line at the head of each entry file
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

struct DiskPartition {
    name: String,
    dir: PathBuf,
}

impl DiskPartition {
    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXT))
    }

    fn err(&self, operation: &str, reason: impl ToString) -> ShellCacheError {
        ShellCacheError::store(operation, &self.name, reason)
    }

    async fn read_key(path: &Path) -> std::io::Result<Option<String>> {
        let file = fs::File::open(path).await?;
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line).await?;
        Ok(serde_json::from_str::<EntryMeta>(line.trim_end())
            .ok()
            .map(|meta| meta.key))
    }
}

#[async_trait]
impl Partition for DiskPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> ShellCacheResult<Option<CachedResponse>> {
        let bytes = match fs::read(self.entry_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.err("get", e)),
        };

        let split = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| self.err("get", format!("entry for {} has no header", key)))?;
        let meta: EntryMeta =
            serde_json::from_slice(&bytes[..split]).map_err(|e| self.err("get", e))?;
        if meta.key != key {
            return Ok(None);
        }

        Ok(Some(CachedResponse {
            status: meta.status,
            headers: meta.headers,
            body: bytes[split + 1..].to_vec(),
        }))
    }

    async fn put(&self, key: &str, response: CachedResponse) -> ShellCacheResult<()> {
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            headers: response.headers,
        };
        let mut contents = serde_json::to_vec(&meta)?;
        contents.push(b'\n');
        contents.extend_from_slice(&response.body);

        let path = self.entry_path(key);
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        fs::write(&tmp, &contents)
            .await
            .map_err(|e| self.err("put", e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(self.err("put", e));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShellCacheResult<bool> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.err("delete", e)),
        }
    }

    async fn keys(&self) -> ShellCacheResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| self.err("keys", e))?;

        let mut keys = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.err("keys", e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != ENTRY_EXT) {
                continue;
            }
            match Self::read_key(&path).await {
                Ok(Some(key)) => keys.push(key),
                Ok(None) => warn!("Skipping unreadable entry {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(self.err("keys", e)),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
