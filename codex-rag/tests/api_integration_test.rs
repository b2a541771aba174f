//! Integration tests for the HTTP API with stubbed providers

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use codex_cache::{CacheConfig, CacheService, MemoryBackend};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use codex_rag::llm::CompletionRequest;
use codex_rag::{
    build_router, AppConfig, AppContext, AppError, AuthState, JwtAuth, LlmClient, LlmProvider,
    LlmServiceFactory, RetrievedChunk, VectorStore,
};

const SECRET: &str = "test_secret_key_12345";

#[derive(Default)]
struct StubLlm {
    completions: AtomicUsize,
    rate_limited: bool,
}

#[async_trait]
impl LlmClient for StubLlm {
    async fn generate_embedding(&self, text: &str) -> codex_rag::Result<Vec<f32>> {
        Ok(vec![text.len() as f32, 1.0])
    }

    async fn generate_completion(&self, request: &CompletionRequest) -> codex_rag::Result<String> {
        if self.rate_limited {
            return Err(AppError::RateLimited {
                provider: "groq".into(),
                message: "Rate limit reached".into(),
                code: Some("rate_limit_exceeded".into()),
            });
        }
        self.completions.fetch_add(1, Ordering::SeqCst);
        Ok(if request.user_prompt.contains("Context:") {
            "Register it with add_action.".to_string()
        } else {
            "Use a hook.".to_string()
        })
    }
}

#[derive(Default)]
struct StubStore {
    queries: AtomicUsize,
    unreachable: bool,
}

#[async_trait]
impl VectorStore for StubStore {
    async fn query(&self, _embedding: &[f32], _n: usize) -> codex_rag::Result<Vec<RetrievedChunk>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(vec![RetrievedChunk {
            document: "Actions are hooks that run at specific points.".into(),
            title: "Actions".into(),
            url: "https://developer.wordpress.org/plugins/hooks/actions/".into(),
            distance: Some(0.1),
        }])
    }

    async fn health_check(&self) -> codex_rag::Result<()> {
        if self.unreachable {
            return Err(AppError::VectorStore("Chroma unreachable".into()));
        }
        Ok(())
    }
}

struct TestApp {
    router: Router,
    llm: Arc<StubLlm>,
    store: Arc<StubStore>,
}

fn test_app(llm: StubLlm) -> TestApp {
    test_app_with(llm, StubStore::default())
}

fn test_app_with(llm: StubLlm, store: StubStore) -> TestApp {
    let config = AppConfig::from_lookup(|key| match key {
        "ENV" => Some("test".to_string()),
        "EMBEDDING_PROVIDER" => Some("groq".to_string()),
        "CORS_ORIGINS" => Some("http://localhost:3000".to_string()),
        _ => None,
    })
    .unwrap();

    let llm = Arc::new(llm);
    let store = Arc::new(store);
    let mut clients: HashMap<LlmProvider, Arc<dyn LlmClient>> = HashMap::new();
    clients.insert(LlmProvider::Groq, llm.clone());

    let cache_config = CacheConfig::default();
    let cache = Arc::new(CacheService::new(
        Arc::new(MemoryBackend::new(cache_config.clone())),
        cache_config,
    ));
    let ctx = AppContext::assemble(
        cache,
        Arc::new(LlmServiceFactory::new(clients)),
        store.clone(),
        &config,
    );

    TestApp {
        router: build_router(ctx, AuthState::new(SECRET), &config.cors_origins),
        llm,
        store,
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app(StubLlm::default());
    let (status, body) = send(&app.router, admin("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"]["backend"], "memory");
    assert_eq!(body["cache"]["healthy"], true);
    assert_eq!(body["vector_store"]["healthy"], true);
}

#[tokio::test]
async fn test_health_reports_unreachable_vector_store() {
    let store = StubStore {
        unreachable: true,
        ..Default::default()
    };
    let app = test_app_with(StubLlm::default(), store);
    let (status, body) = send(&app.router, admin("GET", "/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["cache"]["healthy"], true);
    assert_eq!(body["vector_store"]["healthy"], false);
}

#[tokio::test]
async fn test_query_returns_answer_and_sources() {
    let app = test_app(StubLlm::default());
    let (status, body) = send(
        &app.router,
        post_json("/query", json!({"question": "How do I add an action?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Register it with add_action.");
    assert_eq!(body["sources"][0]["title"], "Actions");
}

#[tokio::test]
async fn test_repeated_query_served_from_cache() {
    let app = test_app(StubLlm::default());
    let question = json!({"question": "How do I add an action?"});

    for _ in 0..3 {
        let (status, _) = send(&app.router, post_json("/query", question.clone())).await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(app.store.queries.load(Ordering::SeqCst), 1);
    assert_eq!(app.llm.completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_llm_only_query() {
    let app = test_app(StubLlm::default());
    let (status, body) = send(
        &app.router,
        post_json("/query-llm-only", json!({"question": "What is a hook?"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Use a hook.");
    assert_eq!(body["sources"], json!([]));
    assert_eq!(app.store.queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = test_app(StubLlm::default());
    let (status, body) = send(&app.router, post_json("/query", json!({"q": "missing field"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request");
    assert_eq!(body["error"]["statusCode"], 400);
}

#[tokio::test]
async fn test_provider_rate_limit_maps_to_429() {
    let app = test_app(StubLlm {
        rate_limited: true,
        ..Default::default()
    });
    let (status, body) = send(
        &app.router,
        post_json("/query", json!({"question": "How do I add an action?"})),
    )
    .await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["type"], "rate_limit");
    assert_eq!(body["error"]["providerCode"], "rate_limit_exceeded");
}

#[tokio::test]
async fn test_request_id_echoed() {
    let app = test_app(StubLlm::default());
    let request = Request::get("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn test_cache_routes_require_token() {
    let app = test_app(StubLlm::default());

    let (status, body) = send(&app.router, admin("GET", "/cache/stats", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "unauthorized");

    let forged = JwtAuth::new("other-secret").generate_token("ops", None).unwrap();
    let (status, _) = send(&app.router, admin("DELETE", "/cache/tag/answer", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalidate_answer_tag_recomputes_answer_only() {
    let app = test_app(StubLlm::default());
    let token = JwtAuth::new(SECRET).generate_token("ops", Some(1)).unwrap();
    let question = json!({"question": "How do I add an action?"});

    send(&app.router, post_json("/query", question.clone())).await;

    let (status, body) = send(&app.router, admin("DELETE", "/cache/tag/answer", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["target"], "answer");
    assert_eq!(body["removed"], 1);

    send(&app.router, post_json("/query", question)).await;
    // Retrieval and completion entries survive the answer sweep
    assert_eq!(app.store.queries.load(Ordering::SeqCst), 1);
    assert_eq!(app.llm.completions.load(Ordering::SeqCst), 1);

    let (_, stats) = send(&app.router, admin("GET", "/cache/stats", Some(&token))).await;
    assert_eq!(stats["backend"], "memory");
    assert!(stats["hits"].as_u64().unwrap() >= 2);

    let store = &stats["store"];
    let lookups = store["hits"].as_u64().unwrap() + store["misses"].as_u64().unwrap();
    assert!(lookups > 0);
    assert!(store["hit_ratio"].as_f64().is_some());
    assert_eq!(store["removals"], 1);
}

#[tokio::test]
async fn test_invalidate_prefix_and_unknown_tag() {
    let app = test_app(StubLlm::default());
    let token = JwtAuth::new(SECRET).generate_token("ops", Some(1)).unwrap();

    send(&app.router, post_json("/query", json!({"question": "What is a filter?"}))).await;

    let (status, body) =
        send(&app.router, admin("DELETE", "/cache/prefix/rag.retrieval", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (status, body) = send(&app.router, admin("DELETE", "/cache/tag/answers", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request");
}
