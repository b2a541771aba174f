//! # codex-cache
//!
//! Read-through result caching for async operations.
//!
//! An operation is declared once as a [`CachedOperation`] (identity, key
//! prefix, optional tag and TTL). Calls go through [`CacheService::cached`],
//! which returns a stored result when one exists and otherwise runs the
//! wrapped computation and stores what it returns.
//!
//! ## Failure handling
//!
//! The cache is never a source of errors for the caller:
//!
//! - a backend error or timeout on read is treated as a miss
//! - a backend error or timeout on write is logged and ignored
//! - arguments that cannot form a key bypass the cache for that call
//! - results that cannot be serialized are returned but not stored
//!
//! Errors returned by the wrapped computation are passed through untouched
//! and never cached.
//!
//! ## Invalidation
//!
//! ```no_run
//! use codex_cache::{CacheConfig, CacheService, MemoryBackend};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let config = CacheConfig::default();
//! let cache = CacheService::new(Arc::new(MemoryBackend::new(config.clone())), config);
//!
//! // Everything under "lookup:", but not "lookups:"
//! let removed = cache.remove_by_prefix("lookup").await;
//!
//! // Every prefix ever written under the "answer" tag
//! let removed = cache.remove_by_tag("answer").await;
//! # }
//! ```

pub mod cache;
pub mod error;

// Re-export main types for convenience
pub use cache::{
    BackendTagRegistry, CacheBackend, CacheConfig, CacheConfigBuilder, CacheKey, CacheService,
    CacheStats, CacheTag, CacheValue, CachedOperation, CallArgs, DefaultKeyMaker, KeyMaker,
    MemoryBackend, MemoryTagRegistry, ServiceStats, TagRegistry,
};
pub use error::{CacheError, Result};
