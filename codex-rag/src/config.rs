//! Environment-driven application configuration
//!
//! Values come from process environment variables, after loading a `.env`
//! file if one exists. `ENV` selects a profile (`local`, `test`, `prod`);
//! the `prod` profile changes a few defaults before variables are applied.

use crate::error::{AppError, Result};
use crate::llm::LlmProvider;
use codex_cache::CacheConfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Local,
    Test,
    Prod,
}

impl FromStr for Profile {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" | "development" => Ok(Profile::Local),
            "test" => Ok(Profile::Test),
            "prod" | "production" => Ok(Profile::Prod),
            other => Err(AppError::Config(format!("Unknown ENV profile: {}", other))),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Local => write!(f, "local"),
            Profile::Test => write!(f, "test"),
            Profile::Prod => write!(f, "prod"),
        }
    }
}

/// Where tag associations are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRegistryKind {
    /// Per-process; lost on restart
    Memory,
    /// Stored in the cache backend itself
    Backend,
}

impl FromStr for TagRegistryKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(TagRegistryKind::Memory),
            "backend" => Ok(TagRegistryKind::Backend),
            other => Err(AppError::Config(format!(
                "CACHE_TAG_REGISTRY must be 'memory' or 'backend', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Profile,
    pub debug: bool,
    pub app_host: String,
    pub app_port: u16,

    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_embedding_model: String,
    pub openai_base_url: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub groq_base_url: String,
    /// Provider used for question embeddings
    pub embedding_provider: LlmProvider,
    /// Provider used for answers
    pub completion_provider: LlmProvider,

    pub chroma_server_host: String,
    pub chroma_server_port: u16,
    pub rag_collection_name: String,
    pub rag_n_results: usize,

    pub cors_origins: Vec<String>,
    pub log_level: String,
    /// No file logging when unset
    pub log_file: Option<String>,
    pub jwt_secret: String,

    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub cache_tag_registry: TagRegistryKind,
}

pub const DEFAULT_JWT_SECRET: &str = "default_secret_change_in_production";

impl AppConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let env: Profile = var("ENV", "local").parse()?;
        let prod = env == Profile::Prod;

        let (debug_default, log_level_default, log_file_default, cors_default) = if prod {
            (
                "false",
                "WARNING",
                "app.log",
                "https://yourdomain.com,https://www.yourdomain.com",
            )
        } else {
            ("true", "INFO", "", "http://localhost:3000,http://localhost:3001")
        };

        let log_file = var("LOG_FILE", log_file_default);

        Ok(Self {
            env,
            debug: parse_bool("DEBUG", &var("DEBUG", debug_default))?,
            app_host: var("APP_HOST", "0.0.0.0"),
            app_port: parse("APP_PORT", &var("APP_PORT", "8000"))?,

            openai_api_key: var("OPENAI_API_KEY", ""),
            openai_model: var("OPENAI_MODEL", "gpt-4o-mini"),
            openai_embedding_model: var("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            openai_base_url: var("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            groq_api_key: var("GROQ_API_KEY", ""),
            groq_model: var("GROQ_MODEL", "llama-3.3-70b-versatile"),
            groq_base_url: var("GROQ_BASE_URL", "https://api.groq.com/openai/v1"),
            embedding_provider: var("EMBEDDING_PROVIDER", "openai").parse()?,
            completion_provider: var("COMPLETION_PROVIDER", "groq").parse()?,

            chroma_server_host: var("CHROMA_SERVER_HOST", "localhost"),
            chroma_server_port: parse("CHROMA_SERVER_PORT", &var("CHROMA_SERVER_PORT", "8001"))?,
            rag_collection_name: var("RAG_COLLECTION_NAME", "wp_codex_plugin"),
            rag_n_results: parse("RAG_N_RESULTS", &var("RAG_N_RESULTS", "5"))?,

            cors_origins: var("CORS_ORIGINS", cors_default)
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            log_level: var("LOG_LEVEL", log_level_default),
            log_file: if log_file.is_empty() { None } else { Some(log_file) },
            jwt_secret: var("JWT_SECRET", DEFAULT_JWT_SECRET),

            cache_ttl_secs: parse("CACHE_TTL_SECS", &var("CACHE_TTL_SECS", "3600"))?,
            cache_max_entries: parse("CACHE_MAX_ENTRIES", &var("CACHE_MAX_ENTRIES", "10000"))?,
            cache_tag_registry: var("CACHE_TAG_REGISTRY", "memory").parse()?,
        })
    }

    /// The prod profile refuses to serve with the built-in JWT secret
    pub fn check_jwt_secret(&self) -> Result<()> {
        if self.jwt_secret != DEFAULT_JWT_SECRET {
            return Ok(());
        }
        if self.env == Profile::Prod {
            return Err(AppError::Config(
                "JWT_SECRET must be set when ENV=prod".to_string(),
            ));
        }
        warn!("Using default JWT secret. Set JWT_SECRET for production.");
        Ok(())
    }

    pub fn chroma_url(&self) -> String {
        format!("http://{}:{}", self.chroma_server_host, self.chroma_server_port)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::builder()
            .default_ttl(Duration::from_secs(self.cache_ttl_secs))
            .max_entries(self.cache_max_entries)
            .enable_auto_cleanup(true)
            .build()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("debug", &self.debug)
            .field("bind", &self.bind_address())
            .field("embedding_provider", &self.embedding_provider)
            .field("completion_provider", &self.completion_provider)
            .field("chroma", &self.chroma_url())
            .field("collection", &self.rag_collection_name)
            .field("log_level", &self.log_level)
            .field("cache_tag_registry", &self.cache_tag_registry)
            .field("api_keys", &"[REDACTED]")
            .finish()
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{} has invalid value '{}': {}", key, raw, e)))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!("{} is not a boolean: '{}'", key, raw))),
    }
}
