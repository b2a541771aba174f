//! Tag registry: which prefixes were written under which tag
//!
//! Tags are an application-defined closed set (usually an enum implementing
//! [`CacheTag`]). Each time a tagged operation stores a result, its prefix is
//! associated with the tag; invalidating the tag sweeps all of those
//! prefixes.

use crate::cache::backend::CacheBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// Reserved key namespace used by [`BackendTagRegistry`]; backends must not
/// evict keys under it to make room
pub const TAG_KEY_PREFIX: &str = "__tags__:";

/// Whether `key` holds tag associations rather than a cached result
pub fn is_registry_key(key: &str) -> bool {
    key.starts_with(TAG_KEY_PREFIX)
}

/// Application-level cache label
pub trait CacheTag: Send + Sync {
    /// Stable name; persisted, so it must not change between releases
    fn name(&self) -> &str;
}

impl CacheTag for str {
    fn name(&self) -> &str {
        self
    }
}

impl CacheTag for String {
    fn name(&self) -> &str {
        self.as_str()
    }
}

#[async_trait]
pub trait TagRegistry: Send + Sync {
    /// Record that `prefix` holds entries written under `tag`. Idempotent.
    async fn associate(&self, tag: &str, prefix: &str) -> Result<()>;

    /// All prefixes associated with `tag` since it was last cleared
    async fn prefixes_for(&self, tag: &str) -> Result<BTreeSet<String>>;

    /// Forget `prefixes` under `tag`, keeping its other associations
    async fn dissociate(&self, tag: &str, prefixes: &BTreeSet<String>) -> Result<()>;

    /// Forget every association of `tag`
    async fn clear(&self, tag: &str) -> Result<()>;
}

/// Associations kept in process memory; lost on restart and invisible to
/// other instances sharing the backend
#[derive(Debug, Default)]
pub struct MemoryTagRegistry {
    associations: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemoryTagRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TagRegistry for MemoryTagRegistry {
    async fn associate(&self, tag: &str, prefix: &str) -> Result<()> {
        {
            let associations = self.associations.read().await;
            if associations
                .get(tag)
                .map(|prefixes| prefixes.contains(prefix))
                .unwrap_or(false)
            {
                return Ok(());
            }
        }

        let mut associations = self.associations.write().await;
        associations
            .entry(tag.to_string())
            .or_default()
            .insert(prefix.to_string());
        Ok(())
    }

    async fn prefixes_for(&self, tag: &str) -> Result<BTreeSet<String>> {
        let associations = self.associations.read().await;
        Ok(associations.get(tag).cloned().unwrap_or_default())
    }

    async fn dissociate(&self, tag: &str, prefixes: &BTreeSet<String>) -> Result<()> {
        let mut associations = self.associations.write().await;
        if let Some(current) = associations.get_mut(tag) {
            current.retain(|prefix| !prefixes.contains(prefix));
            if current.is_empty() {
                associations.remove(tag);
            }
        }
        Ok(())
    }

    async fn clear(&self, tag: &str) -> Result<()> {
        let mut associations = self.associations.write().await;
        associations.remove(tag);
        Ok(())
    }
}

/// Associations persisted in the shared backend under `__tags__:<tag>`
///
/// Every instance using the same backend sees the same associations, so a
/// tag sweep on one instance also removes entries written by another.
/// Updates are read-modify-write; concurrent associations of different
/// prefixes to the same tag can lose one of them (last write wins).
/// Each association rewrites the record, extending its TTL.
pub struct BackendTagRegistry {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl BackendTagRegistry {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    fn tag_key(tag: &str) -> String {
        format!("{}{}", TAG_KEY_PREFIX, tag)
    }

    async fn store(&self, tag: &str, prefixes: &BTreeSet<String>) -> Result<()> {
        let value = serde_json::to_string(prefixes)?;
        self.backend.set(&Self::tag_key(tag), value, self.ttl).await
    }
}

#[async_trait]
impl TagRegistry for BackendTagRegistry {
    async fn associate(&self, tag: &str, prefix: &str) -> Result<()> {
        let mut prefixes = self.prefixes_for(tag).await?;
        prefixes.insert(prefix.to_string());
        self.store(tag, &prefixes).await
    }

    async fn prefixes_for(&self, tag: &str) -> Result<BTreeSet<String>> {
        match self.backend.get(&Self::tag_key(tag)).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(prefixes) => Ok(prefixes),
                Err(e) => {
                    warn!(tag, "Discarding unreadable tag associations: {}", e);
                    Ok(BTreeSet::new())
                }
            },
            None => Ok(BTreeSet::new()),
        }
    }

    async fn dissociate(&self, tag: &str, prefixes: &BTreeSet<String>) -> Result<()> {
        let mut current = self.prefixes_for(tag).await?;
        let before = current.len();
        current.retain(|prefix| !prefixes.contains(prefix));

        if current.len() == before {
            Ok(())
        } else if current.is_empty() {
            self.clear(tag).await
        } else {
            self.store(tag, &current).await
        }
    }

    async fn clear(&self, tag: &str) -> Result<()> {
        self.backend.delete(&Self::tag_key(tag)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryBackend;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_memory_associate_is_idempotent() {
        let registry = MemoryTagRegistry::new();

        registry.associate("answer", "rag.answer").await.unwrap();
        registry.associate("answer", "rag.answer").await.unwrap();
        registry.associate("answer", "rag.llm_only").await.unwrap();

        let prefixes = registry.prefixes_for("answer").await.unwrap();
        assert_eq!(prefixes.len(), 2);
        assert!(prefixes.contains("rag.answer"));
        assert!(registry.prefixes_for("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_clear() {
        let registry = MemoryTagRegistry::new();

        registry.associate("answer", "rag.answer").await.unwrap();
        registry.clear("answer").await.unwrap();

        assert!(registry.prefixes_for("answer").await.unwrap().is_empty());
    }

    fn set_of(prefixes: &[&str]) -> BTreeSet<String> {
        prefixes.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_memory_dissociate_keeps_other_prefixes() {
        let registry = MemoryTagRegistry::new();
        registry.associate("answer", "rag.answer").await.unwrap();
        registry.associate("answer", "rag.llm_only").await.unwrap();

        registry.dissociate("answer", &set_of(&["rag.answer", "never.tagged"])).await.unwrap();
        assert_eq!(registry.prefixes_for("answer").await.unwrap(), set_of(&["rag.llm_only"]));

        registry.dissociate("answer", &set_of(&["rag.llm_only"])).await.unwrap();
        assert!(registry.prefixes_for("answer").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_registry_shared_between_instances() {
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::default());
        let writer = BackendTagRegistry::new(Arc::clone(&backend), MINUTE);
        let other = BackendTagRegistry::new(Arc::clone(&backend), MINUTE);

        writer.associate("answer", "rag.answer").await.unwrap();
        writer.associate("answer", "rag.answer").await.unwrap();
        writer.associate("answer", "rag.llm_only").await.unwrap();

        let prefixes = other.prefixes_for("answer").await.unwrap();
        assert_eq!(prefixes, set_of(&["rag.answer", "rag.llm_only"]));

        other.dissociate("answer", &set_of(&["rag.answer"])).await.unwrap();
        assert_eq!(writer.prefixes_for("answer").await.unwrap(), set_of(&["rag.llm_only"]));

        other.dissociate("answer", &set_of(&["rag.llm_only"])).await.unwrap();
        assert!(backend.get("__tags__:answer").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backend_registry_refreshes_record_ttl() {
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::default());
        let registry = BackendTagRegistry::new(Arc::clone(&backend), Duration::from_millis(80));

        registry.associate("answer", "rag.answer").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.associate("answer", "rag.answer").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(registry.prefixes_for("answer").await.unwrap(), set_of(&["rag.answer"]));
    }

    #[test]
    fn test_registry_keys() {
        assert!(is_registry_key("__tags__:answer"));
        assert!(!is_registry_key("rag.answer:abc"));
    }

    #[tokio::test]
    async fn test_concurrent_memory_associations() {
        let registry = Arc::new(MemoryTagRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    registry
                        .associate("answer", &format!("prefix{}", i % 4))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.prefixes_for("answer").await.unwrap().len(), 4);
    }
}
