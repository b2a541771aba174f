//! Client for OpenAI-compatible HTTP APIs (OpenAI itself and Groq)

use super::client::{CompletionRequest, LlmClient};
use super::LlmProvider;
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

pub struct OpenAiCompatibleClient {
    client: Client,
    provider: LlmProvider,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn new(
        provider: LlmProvider,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            provider,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            embedding_model: None,
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    pub fn openai(config: &AppConfig) -> Self {
        Self::new(
            LlmProvider::OpenAi,
            &config.openai_api_key,
            &config.openai_base_url,
            &config.openai_model,
        )
        .with_embedding_model(&config.openai_embedding_model)
    }

    /// Groq serves chat completions only
    pub fn groq(config: &AppConfig) -> Self {
        Self::new(
            LlmProvider::Groq,
            &config.groq_api_key,
            &config.groq_base_url,
            &config.groq_model,
        )
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn post<Req: Serialize, Res: DeserializeOwned>(&self, endpoint: &str, body: &Req) -> Result<Res> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| AppError::Llm {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
                code: None,
            });
        }

        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let (message, code) = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => (body.error.message, body.error.code),
            Err(_) => (text, None),
        };

        error!(provider = %self.provider, status = status.as_u16(), "{} request failed: {}", endpoint, message);

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited {
                provider: self.provider.to_string(),
                message,
                code,
            },
            _ => AppError::Llm {
                provider: self.provider.to_string(),
                status: status.as_u16(),
                message,
                code,
            },
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.embedding_model.as_deref().ok_or_else(|| AppError::Llm {
            provider: self.provider.to_string(),
            status: 0,
            message: "Provider has no embedding model configured".to_string(),
            code: None,
        })?;

        debug!(provider = %self.provider, model, "Generating embedding");
        let body = EmbeddingBody {
            model,
            input: vec![text],
        };
        let response: EmbeddingResponse = self.post("embeddings", &body).await?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::Llm {
                provider: self.provider.to_string(),
                status: 200,
                message: "Embedding response contained no data".to_string(),
                code: None,
            })?;

        debug!(dimensions = embedding.len(), "Generated embedding");
        Ok(embedding)
    }

    async fn generate_completion(&self, request: &CompletionRequest) -> Result<String> {
        debug!(
            provider = %self.provider,
            model = %self.model,
            system_len = request.system_prompt.len(),
            user_len = request.user_prompt.len(),
            "Generating completion"
        );

        let body = ChatBody {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &request.system_prompt,
                },
                Message {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };
        let response: ChatResponse = self.post("chat/completions", &body).await?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::Llm {
                provider: self.provider.to_string(),
                status: 200,
                message: format!("Empty response received from {} API", self.provider),
                code: None,
            })?;

        debug!(chars = answer.len(), "Generated completion");
        Ok(answer)
    }
}

impl std::fmt::Debug for OpenAiCompatibleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleClient")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
