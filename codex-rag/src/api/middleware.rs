//! Request middleware: bearer authentication and request ids

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::auth::JwtAuth;
use crate::error::AppError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AuthState {
    pub jwt_auth: Arc<JwtAuth>,
}

impl AuthState {
    pub fn new(secret: &str) -> Self {
        Self {
            jwt_auth: Arc::new(JwtAuth::new(secret)),
        }
    }
}

/// Subject of the validated token, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedSubject(pub String);

/// Id of the current request, taken from `x-request-id` or generated
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = JwtAuth::extract_bearer_token(auth_header)?;
    let claims = state.jwt_auth.validate_token(&token)?;

    debug!(subject = %claims.sub, jti = %claims.jti, "Authenticated admin request");
    request
        .extensions_mut()
        .insert(AuthenticatedSubject(claims.sub));

    Ok(next.run(request).await)
}

/// Attach a request id to the request extensions and echo it on the response
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
