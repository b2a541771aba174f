//! Values held by [`MemoryBackend`](crate::cache::MemoryBackend)

use crate::cache::types::CacheValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed bookkeeping cost charged to every entry on top of key and value
const ENTRY_OVERHEAD: usize = 64;

/// A serialized value plus the timestamps the backend needs for TTL and LRU
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: CacheValue,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_read_at: DateTime<Utc>,
    pub reads: u64,

    /// Bytes charged against `max_size_bytes`
    pub size_bytes: usize,
}

impl CacheEntry {
    /// Entry for `key` living for `ttl`; absurdly long TTLs saturate
    pub fn new(key: &str, value: CacheValue, ttl: Duration) -> Self {
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let size_bytes = key.len() + value.len() + ENTRY_OVERHEAD;

        Self {
            value,
            created_at: now,
            expires_at,
            last_read_at: now,
            reads: 0,
            size_bytes,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining_ttl(&self) -> Option<Duration> {
        (self.expires_at - Utc::now())
            .to_std()
            .ok()
            .filter(|left| !left.is_zero())
    }

    /// Record a read
    pub fn touch(&mut self) -> &CacheValue {
        self.last_read_at = Utc::now();
        self.reads += 1;
        &self.value
    }
}
