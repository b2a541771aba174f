//! Question answering over the documentation collection

pub mod dto;
pub mod handler;
pub mod prompt;
pub mod tags;

pub use dto::{QueryRequest, QueryResponse, Source};
pub use handler::{LlmOnlyHandler, RagHandler};
pub use prompt::PromptService;
pub use tags::RagCacheTag;
