//! LLM providers: embeddings and chat completions

pub mod client;
pub mod factory;
pub mod openai;
pub mod service;

pub use client::{CompletionRequest, LlmClient};
pub use factory::LlmServiceFactory;
pub use openai::OpenAiCompatibleClient;
pub use service::LlmService;

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Groq,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Groq => "groq",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "groq" => Ok(LlmProvider::Groq),
            other => Err(AppError::Config(format!("Unknown LLM provider: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmOperation {
    Embedding,
    Completion,
}

impl fmt::Display for LlmOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmOperation::Embedding => write!(f, "embedding"),
            LlmOperation::Completion => write!(f, "completion"),
        }
    }
}
