//! JWT issuing and validation for the cache administration routes

use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Who the token was issued to
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id, logged on use
    pub jti: String,
}

pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

pub const DEFAULT_TOKEN_HOURS: i64 = 24;

impl JwtAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for `subject`, valid for `expires_in_hours` (24 by default)
    pub fn generate_token(&self, subject: &str, expires_in_hours: Option<i64>) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(expires_in_hours.unwrap_or(DEFAULT_TOKEN_HOURS));

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
    }

    /// Token from an `Authorization: Bearer <token>` header value
    pub fn extract_bearer_token(auth_header: &str) -> Result<String> {
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))?
            .trim();

        if token.is_empty() {
            return Err(AppError::Unauthorized("Empty token".into()));
        }

        Ok(token.to_string())
    }
}
