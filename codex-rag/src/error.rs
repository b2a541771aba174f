//! Application errors and their HTTP representation

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codex_cache::CacheError;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{provider} request failed ({status}): {message}")]
    Llm {
        provider: String,
        status: u16,
        message: String,
        code: Option<String>,
    },

    #[error("{provider} rate limit exceeded: {message}")]
    RateLimited {
        provider: String,
        message: String,
        code: Option<String>,
    },

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Llm { .. } | AppError::VectorStore(_) | AppError::Http(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Config(_) | AppError::Cache(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable identifier sent to clients in `error.type`
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration_error",
            AppError::Llm { .. } => "llm_error",
            AppError::RateLimited { .. } => "rate_limit",
            AppError::VectorStore(_) => "vector_store_error",
            AppError::BadRequest(_) => "invalid_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Cache(_) => "cache_error",
            AppError::Http(_) => "http_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    fn provider_code(&self) -> String {
        match self {
            AppError::Llm { code: Some(code), .. }
            | AppError::RateLimited { code: Some(code), .. } => code.clone(),
            _ => "Not provided".to_string(),
        }
    }

    pub fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                status_code: self.status_code().as_u16(),
                error_type: self.error_type().to_string(),
                provider_code: self.provider_code(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(rename = "providerCode")]
    pub provider_code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error_type = self.error_type(), "{}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}
