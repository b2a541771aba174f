//! Storage backend abstraction
//!
//! A backend stores serialized values under string keys with a TTL and can
//! sweep every key sharing a prefix. Consistency between processes sharing
//! one store is the backend's business; the cache service adds no
//! in-process layer on top.
//!
//! Keys under [`TAG_KEY_PREFIX`](crate::cache::TAG_KEY_PREFIX) hold tag
//! associations. A bounded backend must not evict them to make room.

use crate::cache::types::{CacheStats, CacheValue};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name used in logs and health output
    fn name(&self) -> &'static str;

    /// Fetch a value; a missing or expired key is `Ok(None)`
    async fn get(&self, key: &str) -> Result<Option<CacheValue>>;

    /// Store a value, overwriting any existing entry under `key`
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<()>;

    /// Remove one key; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every key starting with `prefix`; returns how many were removed
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Cheap round trip to check the store is reachable
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    /// Counters kept by the store itself, if it keeps any
    async fn store_stats(&self) -> Option<CacheStats> {
        None
    }
}
