//! Service wiring shared by the HTTP server and the CLI

use crate::config::{AppConfig, TagRegistryKind};
use crate::llm::{LlmService, LlmServiceFactory};
use crate::rag::{LlmOnlyHandler, RagHandler};
use crate::vector::{ChromaClient, VectorStore};
use codex_cache::{BackendTagRegistry, CacheBackend, CacheService, MemoryBackend};
use std::sync::Arc;
use tracing::info;

/// Everything a request needs, built once at startup
#[derive(Clone)]
pub struct AppContext {
    pub cache: Arc<CacheService>,
    pub vector_store: Arc<dyn VectorStore>,
    pub rag: Arc<RagHandler>,
    pub llm_only: Arc<LlmOnlyHandler>,
}

impl AppContext {
    pub fn from_config(config: &AppConfig) -> Self {
        let cache_config = config.cache_config();
        let backend = Arc::new(MemoryBackend::new(cache_config.clone()));
        backend.spawn_auto_cleanup();

        let backend: Arc<dyn CacheBackend> = backend;
        let mut cache = CacheService::new(Arc::clone(&backend), cache_config.clone());
        if config.cache_tag_registry == TagRegistryKind::Backend {
            cache = cache.with_tag_registry(Arc::new(BackendTagRegistry::new(
                backend,
                cache_config.tag_registry_ttl,
            )));
        }
        info!(backend = cache.backend().name(), registry = ?config.cache_tag_registry, "Cache ready");

        let factory = Arc::new(LlmServiceFactory::from_config(config));
        let store: Arc<dyn VectorStore> = Arc::new(ChromaClient::from_config(config));

        Self::assemble(
            Arc::new(cache),
            factory,
            store,
            config,
        )
    }

    /// Wire handlers around already-built collaborators
    pub fn assemble(
        cache: Arc<CacheService>,
        factory: Arc<LlmServiceFactory>,
        vector_store: Arc<dyn VectorStore>,
        config: &AppConfig,
    ) -> Self {
        let llm = Arc::new(LlmService::new(
            factory,
            Arc::clone(&cache),
            config.embedding_provider,
            config.completion_provider,
        ));

        Self {
            rag: Arc::new(RagHandler::new(
                Arc::clone(&llm),
                Arc::clone(&vector_store),
                Arc::clone(&cache),
                config.rag_n_results,
            )),
            llm_only: Arc::new(LlmOnlyHandler::new(llm, Arc::clone(&cache))),
            cache,
            vector_store,
        }
    }
}
