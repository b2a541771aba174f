//! # codex-rag
//!
//! Question answering over the WordPress developer documentation. A question
//! is embedded, the nearest documentation chunks are fetched from Chroma, and
//! a chat model answers from that context. Embeddings, retrievals,
//! completions and final answers all go through the `codex-cache` service.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod vector;

pub use api::{build_router, ApiServer, AuthState, JwtAuth};
pub use app::AppContext;
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use llm::{LlmClient, LlmProvider, LlmService, LlmServiceFactory};
pub use rag::{LlmOnlyHandler, QueryRequest, QueryResponse, RagCacheTag, RagHandler};
pub use vector::{ChromaClient, RetrievedChunk, VectorStore};
