//! TTL cache with lazy eviction

use crate::types::{CacheEntry, CacheStats};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Generate a cache key from arbitrary bytes
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// A string-keyed cache whose entries expire `ttl` after they were stored
pub struct TtlCache<V> {
    /// Name used in logs and statistics
    name: String,
    /// Cached entries
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    /// Maximum age of a visible entry
    ttl: Duration,
    /// Optional bound on the number of entries
    max_entries: Option<usize>,
    /// Cache hit counter
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync,
{
    /// Create a new unbounded cache
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        let name = name.into();
        info!(cache = %name, ttl_secs = ttl.as_secs(), "Initialized cache");
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Bound the cache to `max_entries`, evicting the oldest entry when full
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a value if present and not expired
    pub async fn get(&self, key: &str) -> Option<V> {
        let entry = {
            let entries = self.entries.read().await;
            entries.get(key).cloned()
        };

        if let Some(entry) = entry {
            if entry.is_fresh(self.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key = %key, "Cache hit");
                return Some(entry.value);
            }

            // A concurrent set may have replaced the entry since it was read
            let mut entries = self.entries.write().await;
            if entries
                .get(key)
                .is_some_and(|current| !current.is_fresh(self.ttl))
            {
                entries.remove(key);
                debug!(cache = %self.name, key = %key, "Cache entry expired");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(cache = %self.name, key = %key, "Cache miss");
        None
    }

    /// Insert or overwrite a value, resetting its age
    pub async fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut entries = self.entries.write().await;

        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.stored_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    debug!(cache = %self.name, key = %oldest, "Evicted oldest cache entry");
                }
            }
        }

        debug!(cache = %self.name, key = %key, "Added to cache");
        entries.insert(key, CacheEntry::new(value));
    }

    /// Get a cached value, or produce, store and return it on a miss.
    ///
    /// The producer runs at most once per call and never when a fresh entry
    /// exists. The lock is not held while producing, so two concurrent
    /// callers missing on the same key may both produce; the last write wins.
    pub async fn get_or_set<F, Fut>(&self, key: &str, producer: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        if let Some(value) = self.get(key).await {
            return value;
        }

        let value = producer().await;
        self.set(key, value.clone()).await;
        value
    }

    /// Like [`get_or_set`](Self::get_or_set) but with a fallible producer.
    /// Nothing is stored when the producer fails.
    pub async fn try_get_or_set<F, Fut, E>(&self, key: &str, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = producer().await?;
        self.set(key, value.clone()).await;
        Ok(value)
    }

    /// Remove an entry, no-op if absent
    pub async fn invalidate(&self, key: &str) {
        let removed = self.entries.write().await.remove(key);
        if removed.is_some() {
            debug!(cache = %self.name, key = %key, "Invalidated cache entry");
        }
    }

    /// Remove all entries. Hit and miss counters are kept.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        info!(cache = %self.name, "Cleared cache");
    }

    /// Number of stored entries, including expired ones not yet accessed
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            name: self.name.clone(),
            entries,
            hits,
            misses,
            hit_rate: CacheStats::hit_rate(hits, misses),
        }
    }
}
