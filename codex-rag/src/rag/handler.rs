//! Query handlers: retrieval-augmented and LLM-only answers

use super::dto::{QueryRequest, QueryResponse, Source};
use super::prompt::PromptService;
use super::tags::RagCacheTag;
use crate::error::Result;
use crate::llm::LlmService;
use crate::vector::{RetrievedChunk, VectorStore};
use codex_cache::{CacheService, CachedOperation, CallArgs};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Embed the question, retrieve context, answer from that context
pub struct RagHandler {
    llm: Arc<LlmService>,
    store: Arc<dyn VectorStore>,
    cache: Arc<CacheService>,
    n_results: usize,
    answer_op: CachedOperation,
    retrieval_op: CachedOperation,
}

impl RagHandler {
    pub fn new(
        llm: Arc<LlmService>,
        store: Arc<dyn VectorStore>,
        cache: Arc<CacheService>,
        n_results: usize,
    ) -> Self {
        Self {
            llm,
            store,
            cache,
            n_results,
            answer_op: CachedOperation::new("codex_rag::rag::answer")
                .prefix_name("rag.answer")
                .tag(&RagCacheTag::Answer)
                .exclude("request_id"),
            retrieval_op: CachedOperation::new("codex_rag::rag::retrieval")
                .prefix_name("rag.retrieval")
                .tag(&RagCacheTag::Retrieval),
        }
    }

    pub async fn handle_query(&self, request: &QueryRequest, request_id: &str) -> Result<QueryResponse> {
        info!(request_id, "Starting RAG query for question: {}...", request.preview());

        let args = CallArgs::new()
            .named("question", &request.question)
            .named("n_results", &self.n_results)
            .named("request_id", request_id);

        let result = self
            .cache
            .cached(&self.answer_op, args, || self.answer(&request.question))
            .await;

        if let Err(e) = &result {
            error!(request_id, "Unexpected error in RAG query: {}", e);
        }
        result
    }

    async fn answer(&self, question: &str) -> Result<QueryResponse> {
        debug!("Generating embeddings for question");
        let embedding = self.llm.generate_embedding(question).await?;

        let chunks = self.retrieve(&embedding).await?;
        let (contexts, sources): (Vec<String>, Vec<Source>) = chunks
            .into_iter()
            .map(|chunk| {
                debug!(title = %chunk.title, url = %chunk.url, "Added source");
                (
                    chunk.document,
                    Source {
                        title: chunk.title,
                        url: chunk.url,
                    },
                )
            })
            .unzip();

        let user_prompt = PromptService::rag_user_prompt(question, &contexts);
        info!(chars = user_prompt.len(), "Final prompt length");
        debug!("Final assembled prompt:\n{}", user_prompt);

        let answer = self
            .llm
            .generate_completion(PromptService::rag_system_prompt(), &user_prompt)
            .await?;
        info!(chars = answer.len(), "RAG query completed successfully");

        Ok(QueryResponse { answer, sources })
    }

    async fn retrieve(&self, embedding: &[f32]) -> Result<Vec<RetrievedChunk>> {
        let args = CallArgs::new()
            .named("embedding", embedding)
            .named("n_results", &self.n_results);

        self.cache
            .cached(&self.retrieval_op, args, || {
                self.store.query(embedding, self.n_results)
            })
            .await
    }
}

/// Answer from the model alone, without retrieval
pub struct LlmOnlyHandler {
    llm: Arc<LlmService>,
    cache: Arc<CacheService>,
    answer_op: CachedOperation,
}

impl LlmOnlyHandler {
    pub fn new(llm: Arc<LlmService>, cache: Arc<CacheService>) -> Self {
        Self {
            llm,
            cache,
            answer_op: CachedOperation::new("codex_rag::rag::llm_only")
                .prefix_name("rag.llm_only")
                .tag(&RagCacheTag::Answer)
                .exclude("request_id"),
        }
    }

    pub async fn handle_query(&self, request: &QueryRequest, request_id: &str) -> Result<QueryResponse> {
        info!(request_id, "Starting LLM-only query for question: {}...", request.preview());

        let args = CallArgs::new()
            .named("question", &request.question)
            .named("request_id", request_id);

        let result = self
            .cache
            .cached(&self.answer_op, args, || async {
                let user_prompt = PromptService::llm_only_user_prompt(&request.question);
                debug!("Final assembled prompt:\n{}", user_prompt);

                let answer = self
                    .llm
                    .generate_completion(PromptService::llm_only_system_prompt(), &user_prompt)
                    .await?;
                info!(chars = answer.len(), "LLM-only query completed successfully");

                Ok(QueryResponse {
                    answer,
                    sources: Vec::new(),
                })
            })
            .await;

        if let Err(e) = &result {
            error!(request_id, "Unexpected error in LLM-only query: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::llm::{CompletionRequest, LlmClient, LlmProvider, LlmServiceFactory};
    use async_trait::async_trait;
    use codex_cache::{CacheConfig, MemoryBackend};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct EchoLlm {
        completions: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32])
        }

        async fn generate_completion(&self, request: &CompletionRequest) -> Result<String> {
            self.completions.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} chars of context", request.user_prompt.len()))
        }
    }

    #[derive(Default)]
    struct FixedStore {
        queries: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn query(&self, _embedding: &[f32], n_results: usize) -> Result<Vec<RetrievedChunk>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::VectorStore("collection missing".into()));
            }
            Ok((0..n_results.min(2))
                .map(|i| RetrievedChunk {
                    document: format!("chunk {}", i),
                    title: format!("Doc {}", i),
                    url: format!("https://developer.wordpress.org/{}", i),
                    distance: Some(i as f32 / 10.0),
                })
                .collect())
        }
    }

    struct Fixture {
        llm_client: Arc<EchoLlm>,
        store: Arc<FixedStore>,
        cache: Arc<CacheService>,
        rag: RagHandler,
        llm_only: LlmOnlyHandler,
    }

    fn fixture(store: FixedStore) -> Fixture {
        let llm_client = Arc::new(EchoLlm::default());
        let mut clients: HashMap<LlmProvider, Arc<dyn LlmClient>> = HashMap::new();
        clients.insert(LlmProvider::Groq, llm_client.clone());

        let config = CacheConfig::default();
        let cache = Arc::new(CacheService::new(
            Arc::new(MemoryBackend::new(config.clone())),
            config,
        ));
        let llm = Arc::new(LlmService::new(
            Arc::new(LlmServiceFactory::new(clients)),
            cache.clone(),
            LlmProvider::Groq,
            LlmProvider::Groq,
        ));
        let store = Arc::new(store);

        Fixture {
            rag: RagHandler::new(llm.clone(), store.clone(), cache.clone(), 5),
            llm_only: LlmOnlyHandler::new(llm, cache.clone()),
            llm_client,
            store,
            cache,
        }
    }

    #[tokio::test]
    async fn test_rag_answer_includes_sources() {
        let f = fixture(FixedStore::default());
        let response = f
            .rag
            .handle_query(&QueryRequest::new("What is a hook?"), "req-1")
            .await
            .unwrap();

        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].title, "Doc 0");
        let expected = PromptService::rag_user_prompt("What is a hook?", &["chunk 0", "chunk 1"]);
        assert_eq!(response.answer, format!("{} chars of context", expected.len()));
    }

    #[tokio::test]
    async fn test_repeated_question_served_from_cache() {
        let f = fixture(FixedStore::default());
        let request = QueryRequest::new("What is a hook?");

        let first = f.rag.handle_query(&request, "req-1").await.unwrap();
        let second = f.rag.handle_query(&request, "req-2").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.store.queries.load(Ordering::SeqCst), 1);
        assert_eq!(f.llm_client.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_answer_invalidation_keeps_retrieval() {
        let f = fixture(FixedStore::default());
        let request = QueryRequest::new("What is a hook?");

        f.rag.handle_query(&request, "req-1").await.unwrap();
        assert!(f.cache.remove_by_tag(&RagCacheTag::Answer).await >= 1);
        f.rag.handle_query(&request, "req-2").await.unwrap();

        // Answer recomputed, but retrieval and completion stay cached
        assert_eq!(f.store.queries.load(Ordering::SeqCst), 1);
        assert_eq!(f.llm_client.completions.load(Ordering::SeqCst), 1);

        f.cache.remove_by_tag(&RagCacheTag::Answer).await;
        f.cache.remove_by_tag(&RagCacheTag::Retrieval).await;
        f.rag.handle_query(&request, "req-3").await.unwrap();
        assert_eq!(f.store.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_vector_store_failure_propagates_and_is_not_cached() {
        let f = fixture(FixedStore {
            fail: true,
            ..Default::default()
        });
        let request = QueryRequest::new("What is a hook?");

        for _ in 0..2 {
            let err = f.rag.handle_query(&request, "req").await.unwrap_err();
            assert!(matches!(err, AppError::VectorStore(_)));
        }
        assert_eq!(f.store.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_llm_only_has_no_sources() {
        let f = fixture(FixedStore::default());
        let request = QueryRequest::new("What is a hook?");

        let response = f.llm_only.handle_query(&request, "req-1").await.unwrap();
        f.llm_only.handle_query(&request, "req-2").await.unwrap();

        assert!(response.sources.is_empty());
        assert_eq!(f.store.queries.load(Ordering::SeqCst), 0);
        assert_eq!(f.llm_client.completions.load(Ordering::SeqCst), 1);
    }
}
