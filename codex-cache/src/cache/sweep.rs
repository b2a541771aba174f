//! Bulk removals performed by [`MemoryBackend`](crate::cache::MemoryBackend)

use crate::cache::types::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "prefix", rename_all = "snake_case")]
pub enum SweepCause {
    Expired,
    Prefix(String),
    Cleared,
}

impl fmt::Display for SweepCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepCause::Expired => f.write_str("expired"),
            SweepCause::Prefix(prefix) => write!(f, "prefix {}", prefix),
            SweepCause::Cleared => f.write_str("cleared"),
        }
    }
}

/// Keys removed in one pass and why
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sweep {
    pub cause: SweepCause,
    pub keys: Vec<CacheKey>,
    pub at: DateTime<Utc>,
}

impl Sweep {
    pub fn new(cause: SweepCause, keys: Vec<CacheKey>) -> Self {
        Self {
            cause,
            keys,
            at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
