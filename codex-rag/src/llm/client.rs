use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Parameters of one chat completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.2,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A provider able to embed text and answer chat prompts
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    async fn generate_completion(&self, request: &CompletionRequest) -> Result<String>;
}
