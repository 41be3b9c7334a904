//! Expiring key-value store backing the track-information and lyrics caches
//!
//! Entries carry the instant they were stored and become invalid once their
//! time-to-live has elapsed; expired entries are dropped on read. Each store
//! persists to a JSON file under the cache directory, loaded once at startup
//! and saved best-effort on every write.
//!
//! Negative results are expressed through the value type: a store of
//! `Option<T>` can hold `None` as the "known absent" sentinel, which is
//! distinct from a cache miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

pub const DEFAULT_CACHE_DIR: &str = ".cache";

#[derive(Clone, serde::Serialize, serde::Deserialize)]
struct StoredEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

/// A namespaced, versioned key-value store with per-entry expiry.
#[derive(Clone)]
pub struct ExpireStore<T> {
    namespace: String,
    version: u32,
    ttl: Duration,
    cache_dir: PathBuf,
    entries: Arc<RwLock<HashMap<String, StoredEntry<T>>>>,
}

impl<T: Clone + Serialize + DeserializeOwned> ExpireStore<T> {
    pub fn new(namespace: impl Into<String>, version: u32, ttl: Duration) -> Self {
        Self::with_cache_dir(namespace, version, ttl, DEFAULT_CACHE_DIR)
    }

    pub fn with_cache_dir(
        namespace: impl Into<String>,
        version: u32,
        ttl: Duration,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            version,
            ttl,
            cache_dir: cache_dir.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn file_path(&self) -> PathBuf {
        self.cache_dir
            .join(format!("{}.v{}.json", self.namespace, self.version))
    }

    pub async fn load_from_disk(&self) -> Result<()> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let stored: HashMap<String, StoredEntry<T>> = serde_json::from_str(&content)?;

        let mut entries = self.entries.write().await;
        *entries = stored;
        tracing::debug!(
            namespace = %self.namespace,
            count = entries.len(),
            "Cache loaded from disk"
        );
        Ok(())
    }

    pub async fn save_to_disk(&self) -> Result<()> {
        let dir = Path::new(&self.cache_dir);
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await?;
        }

        let entries = self.entries.read().await;
        let content = serde_json::to_string(&*entries)?;
        drop(entries);

        tokio::fs::write(self.file_path(), content).await?;
        Ok(())
    }

    /// Look up `key`, returning the stored value if present and not expired.
    /// Expired entries are evicted as a side effect.
    pub async fn get(&self, key: &str) -> Option<T> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if !self.is_expired(entry) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // The entry may have been refreshed while we waited for the write
        // lock; only evict it if it is still expired.
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if self.is_expired(entry) => {
                entries.remove(key);
                tracing::trace!(namespace = %self.namespace, key, "Expired cache entry evicted");
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Store `value` under `key`, persisting to disk best-effort.
    pub async fn set(&self, key: impl Into<String>, value: T) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.into(),
            StoredEntry {
                value,
                stored_at: Utc::now(),
            },
        );
        drop(entries);

        if let Err(error) = self.save_to_disk().await {
            tracing::warn!(namespace = %self.namespace, %error, "Failed to persist cache");
        }
    }

    fn is_expired(&self, entry: &StoredEntry<T>) -> bool {
        Utc::now() - entry.stored_at >= self.ttl
    }
}
