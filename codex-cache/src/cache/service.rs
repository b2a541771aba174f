//! Read-through caching of async operations
//!
//! [`CacheService`] wraps any fallible async computation: it derives a key
//! from the operation and its arguments, returns the stored result on a hit
//! without running the computation, and otherwise runs it and stores the
//! result. Cache failures never reach the caller; failures of the wrapped
//! computation always do, unchanged and uncached.

use crate::cache::{
    backend::CacheBackend,
    config::CacheConfig,
    key::{sweep_pattern, CallArgs, DefaultKeyMaker, KeyMaker},
    registry::{CacheTag, MemoryTagRegistry, TagRegistry},
    types::{CacheKey, CacheStats},
};
use crate::error::CacheError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Declaration of one cached operation
///
/// ```
/// use codex_cache::cache::CachedOperation;
/// use std::time::Duration;
///
/// let op = CachedOperation::new("app::lookup")
///     .ttl(Duration::from_secs(60))
///     .exclude("request_id");
/// assert_eq!(op.prefix(), "app.lookup");
/// ```
#[derive(Debug, Clone)]
pub struct CachedOperation {
    identity: String,
    prefix: Option<String>,
    tag: Option<String>,
    ttl: Option<Duration>,
    excluded: Vec<String>,
}

impl CachedOperation {
    /// `identity` must stay the same across releases for entries to remain addressable
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            prefix: None,
            tag: None,
            ttl: None,
            excluded: Vec::new(),
        }
    }

    pub fn prefix_name(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn tag<T: CacheTag + ?Sized>(mut self, tag: &T) -> Self {
        self.tag = Some(tag.name().to_string());
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Named argument that never contributes to the key
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded.push(name.into());
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Declared prefix, or the identity with `::` replaced by `.`
    pub fn prefix(&self) -> String {
        match &self.prefix {
            Some(prefix) => prefix.clone(),
            None => self.identity.replace("::", "."),
        }
    }

    pub fn tag_name(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }
}

/// Counters kept by the service itself, independent of the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub hits: u64,
    pub misses: u64,
    /// Calls that ran uncached because no key could be made
    pub bypasses: u64,
    /// Reads or writes that failed or timed out
    pub backend_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    backend_failures: AtomicU64,
}

/// The cache façade. Construct once and share it by `Arc`.
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    key_maker: Arc<dyn KeyMaker>,
    registry: Arc<dyn TagRegistry>,
    config: CacheConfig,
    counters: Counters,
}

impl CacheService {
    /// Service with the default key maker and an in-process tag registry
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            key_maker: Arc::new(DefaultKeyMaker),
            registry: Arc::new(MemoryTagRegistry::new()),
            config,
            counters: Counters::default(),
        }
    }

    pub fn with_key_maker(mut self, key_maker: Arc<dyn KeyMaker>) -> Self {
        self.key_maker = key_maker;
        self
    }

    pub fn with_tag_registry(mut self, registry: Arc<dyn TagRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Run `compute` through the cache
    ///
    /// On a hit `compute` is not called. On a miss its result is returned
    /// and stored; an `Err` from `compute` is returned as-is and nothing is
    /// stored.
    pub async fn cached<R, E, F, Fut>(
        &self,
        op: &CachedOperation,
        args: CallArgs,
        compute: F,
    ) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let prefix = op.prefix();
        let args = args.excluding(op.excluded());

        let key = match self.key_maker.make(op.identity(), &args, &prefix) {
            Ok(key) => key,
            Err(e) => {
                warn!(operation = op.identity(), "Bypassing cache: {}", e);
                self.counters.bypasses.fetch_add(1, Ordering::Relaxed);
                return compute().await;
            }
        };

        if let Some(raw) = self.read(&key).await {
            match serde_json::from_str::<R>(&raw) {
                Ok(value) => {
                    debug!(operation = op.identity(), key = %key, "Cache hit");
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(e) => {
                    warn!(key = %key, "Ignoring undecodable cache entry: {}", e);
                }
            }
        }

        debug!(operation = op.identity(), key = %key, "Cache miss");
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let result = compute().await?;
        self.write(op, &prefix, &key, &result).await;
        Ok(result)
    }

    /// Drop the entry a call with `args` would hit; returns whether one existed
    pub async fn remove(&self, op: &CachedOperation, args: CallArgs) -> bool {
        let args = args.excluding(op.excluded());
        let key = match self.key_maker.make(op.identity(), &args, &op.prefix()) {
            Ok(key) => key,
            Err(_) => return false,
        };

        match self.guarded("delete", &key, self.backend.delete(&key)).await {
            Some(existed) => existed,
            None => false,
        }
    }

    /// Delete every entry stored under `prefix`
    pub async fn remove_by_prefix(&self, prefix: &str) -> usize {
        let pattern = sweep_pattern(prefix);
        let removed = self
            .guarded("delete_by_prefix", &pattern, self.backend.delete_by_prefix(&pattern))
            .await
            .unwrap_or(0);
        debug!(prefix, removed, "Removed entries by prefix");
        removed
    }

    /// Delete every entry under the prefixes associated with `tag`
    pub async fn remove_by_tag<T: CacheTag + ?Sized>(&self, tag: &T) -> usize {
        self.remove_by_tag_name(tag.name()).await
    }

    /// Sweep each prefix of `tag`; only prefixes swept successfully are
    /// forgotten, so a failed sweep can be retried
    pub async fn remove_by_tag_name(&self, tag: &str) -> usize {
        let Some(prefixes) = self.guarded("prefixes_for", tag, self.registry.prefixes_for(tag)).await
        else {
            return 0;
        };

        let mut removed = 0;
        let mut swept = BTreeSet::new();
        for prefix in prefixes {
            let pattern = sweep_pattern(&prefix);
            let sweep = self.backend.delete_by_prefix(&pattern);
            if let Some(count) = self.guarded("delete_by_prefix", &pattern, sweep).await {
                removed += count;
                swept.insert(prefix);
            }
        }

        if !swept.is_empty() {
            let dissociate = self.registry.dissociate(tag, &swept);
            self.guarded("dissociate", tag, dissociate).await;
        }
        debug!(tag, prefixes = swept.len(), removed, "Removed entries by tag");
        removed
    }

    pub async fn prefixes_for_tag(&self, tag: &str) -> Vec<String> {
        self.guarded("prefixes_for", tag, self.registry.prefixes_for(tag))
            .await
            .map(|prefixes| prefixes.into_iter().collect())
            .unwrap_or_default()
    }

    /// Backend reachability, bounded by the backend timeout
    pub async fn health_check(&self) -> crate::error::Result<()> {
        match tokio::time::timeout(self.config.backend_timeout, self.backend.health_check()).await
        {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                timeout_ms: self.config.backend_timeout.as_millis() as u64,
                context: format!("health check on {}", self.backend.name()),
            }),
        }
    }

    /// The backend's own counters; `None` if it keeps none or does not answer in time
    pub async fn backend_stats(&self) -> Option<CacheStats> {
        tokio::time::timeout(self.config.backend_timeout, self.backend.store_stats())
            .await
            .ok()
            .flatten()
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypasses: self.counters.bypasses.load(Ordering::Relaxed),
            backend_failures: self.counters.backend_failures.load(Ordering::Relaxed),
        }
    }

    async fn read(&self, key: &CacheKey) -> Option<String> {
        self.guarded("get", key, self.backend.get(key)).await.flatten()
    }

    async fn write<R: Serialize>(&self, op: &CachedOperation, prefix: &str, key: &CacheKey, result: &R) {
        let value = match serde_json::to_string(result) {
            Ok(value) => value,
            Err(e) => {
                warn!(operation = op.identity(), "Result not cacheable: {}", e);
                return;
            }
        };

        let ttl = op.ttl.unwrap_or_else(|| self.config.ttl_with_jitter());
        if self
            .guarded("set", key, self.backend.set(key, value, ttl))
            .await
            .is_none()
        {
            return;
        }

        if let Some(tag) = op.tag_name() {
            let associate = self.registry.associate(tag, prefix);
            self.guarded("associate", tag, associate).await;
        }
    }

    /// Await a backend call under the timeout; failures are logged and become `None`
    async fn guarded<T, Fut>(&self, action: &str, target: &str, call: Fut) -> Option<T>
    where
        Fut: Future<Output = crate::error::Result<T>>,
    {
        let failure = match tokio::time::timeout(self.config.backend_timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => CacheError::Timeout {
                timeout_ms: self.config.backend_timeout.as_millis() as u64,
                context: format!("{} {}", action, target),
            },
        };

        warn!(
            backend = self.backend.name(),
            action, target, "Cache backend call failed: {}", failure
        );
        self.counters.backend_failures.fetch_add(1, Ordering::Relaxed);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryBackend;
    use std::sync::atomic::AtomicUsize;

    fn service() -> CacheService {
        let config = CacheConfig::builder().ttl_jitter(0.0).build();
        CacheService::new(Arc::new(MemoryBackend::new(config.clone())), config)
    }

    #[test]
    fn test_operation_prefix_defaults_to_identity() {
        let op = CachedOperation::new("codex_rag::rag::answer");
        assert_eq!(op.prefix(), "codex_rag.rag.answer");

        let op = op.prefix_name("rag.answer");
        assert_eq!(op.prefix(), "rag.answer");
    }

    #[tokio::test]
    async fn test_backend_stats_come_from_the_store() {
        let cache = service();
        let op = CachedOperation::new("test::counted");

        for _ in 0..2 {
            let _: Result<u8, CacheError> = cache.cached(&op, CallArgs::new(), || async { Ok(1) }).await;
        }

        let stats = cache.backend_stats().await.unwrap();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_ratio(), Some(0.5));
        assert_eq!(stats.removals(), 0);
    }

    #[tokio::test]
    async fn test_hit_skips_computation() {
        let cache = service();
        let op = CachedOperation::new("test::double");
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, CacheError> = cache
                .cached(&op, CallArgs::new().arg(&21), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value.unwrap(), 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 2);
    }

    #[tokio::test]
    async fn test_errors_propagate_and_are_not_cached() {
        let cache = service();
        let op = CachedOperation::new("test::flaky");
        let calls = AtomicUsize::new(0);

        let first: Result<u32, String> = cache
            .cached(&op, CallArgs::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("upstream down".to_string())
            })
            .await;
        assert_eq!(first.unwrap_err(), "upstream down");

        let second: Result<u32, String> = cache
            .cached(&op, CallArgs::new(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
        assert_eq!(second.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_key_failure_bypasses_cache() {
        let cache = service();
        let op = CachedOperation::new("test::bypass");
        let calls = AtomicUsize::new(0);

        let mut bad = std::collections::BTreeMap::new();
        bad.insert(vec![1u8], 1u8);

        for _ in 0..2 {
            let value: Result<u8, CacheError> = cache
                .cached(&op, CallArgs::new().arg(&bad), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await;
            assert_eq!(value.unwrap(), 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().bypasses, 2);
    }

    #[tokio::test]
    async fn test_remove_single_entry() {
        let cache = service();
        let op = CachedOperation::new("test::single");

        let _: Result<u32, CacheError> = cache
            .cached(&op, CallArgs::new().arg(&1), || async { Ok(1) })
            .await;

        assert!(cache.remove(&op, CallArgs::new().arg(&1)).await);
        assert!(!cache.remove(&op, CallArgs::new().arg(&1)).await);
    }
}
