//! In-process backend with TTL expiry, LRU eviction and memory limits

use crate::cache::{
    backend::CacheBackend,
    config::CacheConfig,
    entry::CacheEntry,
    registry::is_registry_key,
    sweep::{Sweep, SweepCause},
    types::{CacheKey, CacheStats, CacheValue},
};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reference [`CacheBackend`] keeping entries in process memory
///
/// Expiry is checked on every read and, when `enable_auto_cleanup` is set,
/// by a periodic sweep. Once `max_entries` or `max_size_bytes` is reached the
/// least recently used entries make room, or the write is refused when
/// `enable_lru_eviction` is off.
pub struct MemoryBackend {
    config: CacheConfig,
    shelf: RwLock<Shelf>,
}

#[derive(Default)]
struct Shelf {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Front is the least recently used key
    recency: VecDeque<CacheKey>,
    bytes: usize,
    stats: CacheStats,
}

impl Shelf {
    fn take(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.retain(|k| k != key);
        self.bytes = self.bytes.saturating_sub(entry.size_bytes);
        Some(entry)
    }

    fn take_all(&mut self, keys: &[CacheKey]) {
        for key in keys {
            self.take(key);
        }
    }

    fn promote(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(key) = self.recency.remove(pos) {
                self.recency.push_back(key);
            }
        }
    }

    fn keys_where(&self, pred: impl Fn(&CacheKey, &CacheEntry) -> bool) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|(key, entry)| pred(key, entry))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl MemoryBackend {
    pub fn new(config: CacheConfig) -> Self {
        info!(
            max_entries = config.max_entries,
            max_size_bytes = config.max_size_bytes,
            lru = config.enable_lru_eviction,
            "Initializing in-memory cache backend"
        );

        Self {
            config,
            shelf: RwLock::new(Shelf::default()),
        }
    }

    /// Store `value` under `key` for `ttl`, making room if needed
    pub async fn insert(&self, key: CacheKey, value: CacheValue, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(&key, value, ttl);
        let size = entry.size_bytes;

        if size > self.config.max_size_bytes {
            warn!(key = %key, size, "Entry larger than the whole cache, not stored");
            return Err(CacheError::CapacityExceeded {
                entry_bytes: size,
                limit_bytes: self.config.max_size_bytes,
            });
        }

        let mut shelf = self.shelf.write().await;
        shelf.take(&key);
        self.make_room(&mut shelf, size)?;

        debug!(key = %key, size, "Stored cache entry");
        shelf.entries.insert(key.clone(), entry);
        shelf.recency.push_back(key);
        shelf.bytes += size;
        self.refresh_gauges(&mut shelf);

        Ok(())
    }

    /// Read a live value; an expired entry is dropped and reported as absent
    pub async fn lookup(&self, key: &str) -> Option<CacheValue> {
        let mut shelf = self.shelf.write().await;

        let expired = match shelf.entries.get(key) {
            Some(entry) => entry.is_expired(),
            None => {
                shelf.stats.misses += 1;
                return None;
            }
        };

        if expired {
            shelf.take(key);
            shelf.stats.expired += 1;
            shelf.stats.misses += 1;
            self.refresh_gauges(&mut shelf);
            debug!(key, "Cache entry expired");
            return None;
        }

        let value = shelf.entries.get_mut(key).map(|entry| entry.touch().clone());
        shelf.stats.hits += 1;
        if self.config.enable_lru_eviction {
            shelf.promote(key);
        }
        value
    }

    /// Whether `key` holds a live entry; does not count as a read
    pub async fn contains_key(&self, key: &str) -> bool {
        let shelf = self.shelf.read().await;
        shelf.entries.get(key).is_some_and(|entry| !entry.is_expired())
    }

    pub async fn remove(&self, key: &str) -> Option<CacheValue> {
        let mut shelf = self.shelf.write().await;
        let entry = shelf.take(key)?;
        shelf.stats.invalidated += 1;
        self.refresh_gauges(&mut shelf);
        Some(entry.value)
    }

    /// Drop every key starting with `prefix`
    pub async fn sweep_prefix(&self, prefix: &str) -> Sweep {
        let mut shelf = self.shelf.write().await;
        let keys = shelf.keys_where(|key, _| key.starts_with(prefix));
        shelf.take_all(&keys);
        shelf.stats.invalidated += keys.len() as u64;
        self.refresh_gauges(&mut shelf);

        debug!(prefix, removed = keys.len(), "Prefix swept");
        Sweep::new(SweepCause::Prefix(prefix.to_string()), keys)
    }

    pub async fn clear(&self) -> Sweep {
        let mut shelf = self.shelf.write().await;
        let keys: Vec<CacheKey> = shelf.entries.drain().map(|(key, _)| key).collect();
        shelf.recency.clear();
        shelf.bytes = 0;
        shelf.stats.invalidated += keys.len() as u64;
        self.refresh_gauges(&mut shelf);

        info!(removed = keys.len(), "Cache cleared");
        Sweep::new(SweepCause::Cleared, keys)
    }

    /// Drop every expired entry
    pub async fn cleanup_expired(&self) -> Sweep {
        let mut shelf = self.shelf.write().await;
        let keys = shelf.keys_where(|_, entry| entry.is_expired());
        if !keys.is_empty() {
            shelf.take_all(&keys);
            shelf.stats.expired += keys.len() as u64;
            self.refresh_gauges(&mut shelf);
            debug!(removed = keys.len(), "Expired entries swept");
        }
        Sweep::new(SweepCause::Expired, keys)
    }

    pub async fn stats(&self) -> CacheStats {
        self.shelf.read().await.stats.clone()
    }

    pub async fn size_bytes(&self) -> usize {
        self.shelf.read().await.bytes
    }

    /// Stored entries, including expired ones not yet swept
    pub async fn len(&self) -> usize {
        self.shelf.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.shelf.read().await.entries.is_empty()
    }

    /// Spawn the periodic expiry sweep when `enable_auto_cleanup` is set
    pub fn spawn_auto_cleanup(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if !self.config.enable_auto_cleanup {
            return None;
        }

        let backend = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(backend.config.cleanup_interval);
            // The first tick completes immediately
            ticker.tick().await;
            info!(interval = ?backend.config.cleanup_interval, "Cache cleanup task started");

            loop {
                ticker.tick().await;
                backend.cleanup_expired().await;
            }
        }))
    }

    fn is_full(&self, shelf: &Shelf, incoming: usize) -> bool {
        shelf.entries.len() >= self.config.max_entries
            || shelf.bytes + incoming > self.config.max_size_bytes
    }

    fn make_room(&self, shelf: &mut Shelf, incoming: usize) -> Result<()> {
        if !self.config.enable_lru_eviction {
            if self.is_full(shelf, incoming) {
                return Err(CacheError::Full {
                    entries: shelf.entries.len(),
                    bytes: shelf.bytes,
                });
            }
            return Ok(());
        }

        while self.is_full(shelf, incoming) {
            let Some(oldest) = shelf.recency.iter().find(|key| !is_registry_key(key)).cloned() else {
                break;
            };
            debug!(key = %oldest, "Evicting least recently used entry");
            shelf.take(&oldest);
            shelf.stats.evicted += 1;
        }
        Ok(())
    }

    fn refresh_gauges(&self, shelf: &mut Shelf) {
        shelf.stats.entries = shelf.entries.len();
        if self.config.enable_metrics {
            shelf.stats.size_bytes = shelf.bytes;
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<CacheValue>> {
        Ok(self.lookup(key).await)
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()> {
        self.insert(key.to_string(), value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.remove(key).await.is_some())
    }

    async fn store_stats(&self) -> Option<CacheStats> {
        Some(self.stats().await)
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        Ok(self.sweep_prefix(prefix).await.len())
    }
}
