use serde::{Deserialize, Serialize};

/// `<prefix>:<argument digest>`
pub type CacheKey = String;

/// JSON text of a cached result
pub type CacheValue = String;

/// Counters kept by [`MemoryBackend`](crate::cache::MemoryBackend)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,

    /// Live and not-yet-swept entries
    pub entries: usize,
    pub size_bytes: usize,

    /// Removed to make room under `max_entries` / `max_size_bytes`
    pub evicted: u64,
    /// Removed because their TTL ran out
    pub expired: u64,
    /// Removed by `delete`, `delete_by_prefix` or `clear`
    pub invalidated: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups served from the store; `None` before the first lookup
    pub fn hit_ratio(&self) -> Option<f64> {
        match self.lookups() {
            0 => None,
            total => Some(self.hits as f64 / total as f64),
        }
    }

    pub fn removals(&self) -> u64 {
        self.evicted + self.expired + self.invalidated
    }
}
