//! Route handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use codex_cache::{CacheStats, CacheTag, ServiceStats};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::middleware::{AuthenticatedSubject, RequestId};
use crate::app::AppContext;
use crate::error::{AppError, Result};
use crate::rag::{QueryRequest, QueryResponse, RagCacheTag};

const VECTOR_STORE_HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    pub cache: CacheHealth,
    pub vector_store: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub backend: String,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub backend: String,
    #[serde(flatten)]
    pub stats: ServiceStats,
    /// Counters kept by the backend store, absent when it keeps none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreStats>,
}

#[derive(Debug, Serialize)]
pub struct StoreStats {
    #[serde(flatten)]
    pub counters: CacheStats,
    pub hit_ratio: Option<f64>,
    pub removals: u64,
}

impl From<CacheStats> for StoreStats {
    fn from(counters: CacheStats) -> Self {
        Self {
            hit_ratio: counters.hit_ratio(),
            removals: counters.removals(),
            counters,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvalidationResponse {
    pub target: String,
    pub removed: usize,
}

fn parse_body(payload: std::result::Result<Json<QueryRequest>, JsonRejection>) -> Result<QueryRequest> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// `POST /query`: retrieval-augmented answer
pub async fn query(
    State(ctx): State<AppContext>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let request = parse_body(payload)?;
    let response = ctx.rag.handle_query(&request, &request_id).await?;
    Ok(Json(response))
}

/// `POST /query-llm-only`: answer without retrieval, for comparison
pub async fn query_llm_only(
    State(ctx): State<AppContext>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let request = parse_body(payload)?;
    let response = ctx.llm_only.handle_query(&request, &request_id).await?;
    Ok(Json(response))
}

/// `GET /health`: liveness plus the reachability of cache and vector store
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let (cache, vector_store) = tokio::join!(
        ctx.cache.health_check(),
        tokio::time::timeout(VECTOR_STORE_HEALTH_TIMEOUT, ctx.vector_store.health_check()),
    );

    let store_healthy = match vector_store {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Vector store health check failed: {}", e);
            false
        }
        Err(_) => {
            warn!("Vector store health check timed out");
            false
        }
    };
    let cache_healthy = cache.is_ok();
    let status = if cache_healthy && store_healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        message: "RAG service is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: CacheHealth {
            backend: ctx.cache.backend().name().to_string(),
            healthy: cache_healthy,
        },
        vector_store: ComponentHealth {
            healthy: store_healthy,
        },
    })
}

pub async fn cache_stats(State(ctx): State<AppContext>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        backend: ctx.cache.backend().name().to_string(),
        stats: ctx.cache.stats(),
        store: ctx.cache.backend_stats().await.map(StoreStats::from),
    })
}

pub async fn invalidate_prefix(
    State(ctx): State<AppContext>,
    Extension(AuthenticatedSubject(subject)): Extension<AuthenticatedSubject>,
    Path(prefix): Path<String>,
) -> Result<Json<InvalidationResponse>> {
    if prefix.trim().is_empty() {
        return Err(AppError::BadRequest("Prefix must not be empty".into()));
    }

    let removed = ctx.cache.remove_by_prefix(&prefix).await;
    info!(%subject, %prefix, removed, "Cache prefix invalidated");
    Ok(Json(InvalidationResponse { target: prefix, removed }))
}

pub async fn invalidate_tag(
    State(ctx): State<AppContext>,
    Extension(AuthenticatedSubject(subject)): Extension<AuthenticatedSubject>,
    Path(tag): Path<String>,
) -> Result<Json<InvalidationResponse>> {
    let tag: RagCacheTag = tag.parse()?;

    let removed = ctx.cache.remove_by_tag(&tag).await;
    info!(%subject, tag = tag.name(), removed, "Cache tag invalidated");
    Ok(Json(InvalidationResponse {
        target: tag.name().to_string(),
        removed,
    }))
}
