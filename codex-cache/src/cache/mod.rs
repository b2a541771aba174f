//! # Read-through caching
//!
//! Pieces, bottom-up:
//!
//! - [`key`]: deterministic keys from an operation identity and its arguments
//! - [`backend`]: the storage trait, with [`store::MemoryBackend`] as the
//!   in-process implementation
//! - [`registry`]: tag to prefix associations for group invalidation
//! - [`service`]: the [`CacheService`] façade tying them together
//!
//! ## Example
//!
//! ```rust
//! use codex_cache::cache::{CacheConfig, CacheService, CachedOperation, CallArgs, MemoryBackend};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = CacheConfig::builder()
//!     .default_ttl(Duration::from_secs(3600))
//!     .max_entries(10_000)
//!     .build();
//!
//! let cache = CacheService::new(Arc::new(MemoryBackend::new(config.clone())), config);
//! let lookup = CachedOperation::new("app::lookup")
//!     .prefix_name("lookup")
//!     .ttl(Duration::from_secs(60));
//!
//! let value: Result<String, std::io::Error> = cache
//!     .cached(&lookup, CallArgs::new().named("id", &42), || async {
//!         Ok("forty-two".to_string())
//!     })
//!     .await;
//! assert_eq!(value?, "forty-two");
//!
//! cache.remove_by_prefix("lookup").await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod entry;
mod finite;
pub mod key;
pub mod registry;
pub mod service;
pub mod store;
pub mod sweep;
pub mod types;

pub use backend::CacheBackend;
pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::CacheEntry;
pub use key::{sweep_pattern, CallArgs, DefaultKeyMaker, KeyMaker, KEY_SEPARATOR};
pub use registry::{is_registry_key, BackendTagRegistry, CacheTag, MemoryTagRegistry, TagRegistry, TAG_KEY_PREFIX};
pub use service::{CacheService, CachedOperation, ServiceStats};
pub use store::MemoryBackend;
pub use sweep::{Sweep, SweepCause};
pub use types::{CacheKey, CacheStats, CacheValue};
