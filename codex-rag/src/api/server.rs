use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::middleware::{auth_middleware, request_id_middleware, AuthState};
use super::routes::{
    cache_stats, health_check, invalidate_prefix, invalidate_tag, query, query_llm_only,
};
use crate::app::AppContext;
use crate::config::AppConfig;

/// CORS for the configured origins; `*` allows any origin
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Full application router
pub fn build_router(ctx: AppContext, auth_state: AuthState, cors_origins: &[String]) -> Router {
    let admin = Router::new()
        .route("/cache/stats", get(cache_stats))
        .route("/cache/prefix/:prefix", delete(invalidate_prefix))
        .route("/cache/tag/:tag", delete(invalidate_tag))
        .route_layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .route("/query", post(query))
        .route("/query-llm-only", post(query_llm_only))
        .route("/health", get(health_check))
        .merge(admin)
        .with_state(ctx)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

pub struct ApiServer {
    config: AppConfig,
    ctx: AppContext,
}

impl ApiServer {
    pub fn new(config: AppConfig, ctx: AppContext) -> Self {
        Self { config, ctx }
    }

    pub async fn start(self) -> Result<()> {
        self.config.check_jwt_secret()?;

        let auth_state = AuthState::new(&self.config.jwt_secret);
        let app = build_router(self.ctx, auth_state, &self.config.cors_origins);

        let addr = self.config.bind_address();
        info!(env = %self.config.env, "Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
