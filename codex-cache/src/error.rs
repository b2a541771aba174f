//! Error types for cache operations
//!
//! Every fallible cache call returns [`CacheError`]. The cache service treats
//! most of these as soft failures: a failed read is a miss, a failed write is
//! logged and dropped.

use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Backend store unavailable or rejected the operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend call exceeded the configured timeout
    #[error("Operation timed out after {timeout_ms}ms: {context}")]
    Timeout { timeout_ms: u64, context: String },

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Call arguments could not be turned into a cache key
    #[error("Key error: {0}")]
    Key(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single entry does not fit in the store even after eviction
    #[error("Capacity exceeded: entry of {entry_bytes} bytes, limit {limit_bytes} bytes")]
    CapacityExceeded {
        entry_bytes: usize,
        limit_bytes: usize,
    },

    /// Limits reached with LRU eviction disabled
    #[error("Store full: {entries} entries, {bytes} bytes in use")]
    Full { entries: usize, bytes: usize },

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}
