//! Vector store access: nearest documentation chunks for an embedding

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub const DEFAULT_SOURCE_TITLE: &str = "WordPress Codex";

/// One retrieved document with its source metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub document: String,
    pub title: String,
    pub url: String,
    pub distance: Option<f32>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `n_results` chunks nearest to `embedding`, closest first
    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<RetrievedChunk>>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

/// Chroma responds with one inner list per query embedding
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    fn into_chunks(self) -> Vec<RetrievedChunk> {
        let documents = first(self.documents);
        let metadatas = first(self.metadatas);
        let distances = first(self.distances);

        documents
            .into_iter()
            .enumerate()
            .map(|(i, document)| {
                let meta = metadatas.get(i).cloned().flatten().unwrap_or_default();
                let text_field = |name: &str| {
                    meta.get(name)
                        .and_then(Value::as_str)
                        .map(str::to_string)
                };

                RetrievedChunk {
                    document: document.unwrap_or_default(),
                    title: text_field("title").unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string()),
                    url: text_field("url").unwrap_or_default(),
                    distance: distances.get(i).copied().flatten(),
                }
            })
            .collect()
    }
}

fn first<T>(nested: Option<Vec<Vec<T>>>) -> Vec<T> {
    nested
        .and_then(|outer| outer.into_iter().next())
        .unwrap_or_default()
}

/// Chroma server over its REST API
pub struct ChromaClient {
    client: Client,
    base_url: String,
    collection_name: String,
    collection_id: OnceCell<String>,
}

impl ChromaClient {
    pub fn new(base_url: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection_name: collection_name.into(),
            collection_id: OnceCell::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.chroma_url(), &config.rag_collection_name)
    }

    /// Resolve the collection id, creating the collection on first use
    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections", self.base_url);
                let response = self
                    .client
                    .post(&url)
                    .json(&json!({ "name": self.collection_name, "get_or_create": true }))
                    .send()
                    .await
                    .map_err(|e| AppError::VectorStore(format!("Chroma unreachable: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::VectorStore(format!(
                        "Collection '{}' unavailable ({}): {}",
                        self.collection_name, status, body
                    )));
                }

                let collection: CollectionResponse = response
                    .json()
                    .await
                    .map_err(|e| AppError::VectorStore(format!("Bad collection response: {}", e)))?;
                info!(collection = %self.collection_name, id = %collection.id, "Connected to Chroma collection");
                Ok(collection.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[async_trait]
impl VectorStore for ChromaClient {
    async fn query(&self, embedding: &[f32], n_results: usize) -> Result<Vec<RetrievedChunk>> {
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{}/query", self.base_url, id);

        debug!(n_results, "Querying vector database for similar documents");
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": n_results,
                "include": ["documents", "metadatas", "distances"],
            }))
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Chroma query failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore(format!("Chroma query returned {}: {}", status, body)));
        }

        let result: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::VectorStore(format!("Bad query response: {}", e)))?;

        let chunks = result.into_chunks();
        info!(count = chunks.len(), "Found relevant documents");
        Ok(chunks)
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/v1/heartbeat", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Chroma unreachable: {}", e)))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::VectorStore(format!("Chroma heartbeat returned {}", response.status())))
        }
    }
}
