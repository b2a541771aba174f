//! Embeddings and completions with the configured providers, cached

use super::client::CompletionRequest;
use super::factory::LlmServiceFactory;
use super::LlmProvider;
use crate::error::Result;
use crate::rag::tags::RagCacheTag;
use codex_cache::{CacheService, CachedOperation, CallArgs};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 150;

pub struct LlmService {
    factory: Arc<LlmServiceFactory>,
    cache: Arc<CacheService>,
    embedding_provider: LlmProvider,
    completion_provider: LlmProvider,
    embedding_op: CachedOperation,
    completion_op: CachedOperation,
}

impl LlmService {
    pub fn new(
        factory: Arc<LlmServiceFactory>,
        cache: Arc<CacheService>,
        embedding_provider: LlmProvider,
        completion_provider: LlmProvider,
    ) -> Self {
        Self {
            factory,
            cache,
            embedding_provider,
            completion_provider,
            embedding_op: CachedOperation::new("codex_rag::llm::embedding")
                .prefix_name("llm.embedding")
                .tag(&RagCacheTag::Embedding),
            completion_op: CachedOperation::new("codex_rag::llm::completion")
                .prefix_name("llm.completion")
                .tag(&RagCacheTag::Completion),
        }
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let provider = self.embedding_provider;
        let args = CallArgs::new()
            .named("provider", &provider)
            .named("text", text);

        self.cache
            .cached(&self.embedding_op, args, || async {
                debug!(%provider, "Generating embeddings for text");
                self.factory.client(provider)?.generate_embedding(text).await
            })
            .await
    }

    /// Completion with the default temperature and token limit
    pub async fn generate_completion(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = CompletionRequest::new(system_prompt, user_prompt)
            .temperature(DEFAULT_TEMPERATURE)
            .max_tokens(DEFAULT_MAX_TOKENS);
        self.complete(&request).await
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let provider = self.completion_provider;
        let args = CallArgs::new()
            .named("provider", &provider)
            .named("request", request);

        self.cache
            .cached(&self.completion_op, args, || async {
                debug!(%provider, "Generating completion using LLM");
                self.factory.client(provider)?.generate_completion(request).await
            })
            .await
    }
}
