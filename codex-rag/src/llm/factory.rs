use super::client::LlmClient;
use super::openai::OpenAiCompatibleClient;
use super::LlmProvider;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Registry of provider clients
pub struct LlmServiceFactory {
    clients: HashMap<LlmProvider, Arc<dyn LlmClient>>,
}

impl LlmServiceFactory {
    pub fn new(clients: HashMap<LlmProvider, Arc<dyn LlmClient>>) -> Self {
        let mut providers: Vec<_> = clients.keys().map(|p| p.as_str()).collect();
        providers.sort_unstable();
        info!(?providers, "LLM service factory initialized");
        Self { clients }
    }

    /// One client per provider that has an API key configured
    pub fn from_config(config: &AppConfig) -> Self {
        let mut clients: HashMap<LlmProvider, Arc<dyn LlmClient>> = HashMap::new();

        if config.openai_api_key.is_empty() {
            warn!("OPENAI_API_KEY not set; OpenAI provider disabled");
        } else {
            clients.insert(
                LlmProvider::OpenAi,
                Arc::new(OpenAiCompatibleClient::openai(config)),
            );
        }

        if config.groq_api_key.is_empty() {
            warn!("GROQ_API_KEY not set; Groq provider disabled");
        } else {
            clients.insert(LlmProvider::Groq, Arc::new(OpenAiCompatibleClient::groq(config)));
        }

        Self::new(clients)
    }

    pub fn client(&self, provider: LlmProvider) -> Result<Arc<dyn LlmClient>> {
        self.clients
            .get(&provider)
            .cloned()
            .ok_or_else(|| AppError::Config(format!("No client available for provider: {}", provider)))
    }

    pub fn has_provider(&self, provider: LlmProvider) -> bool {
        self.clients.contains_key(&provider)
    }
}
