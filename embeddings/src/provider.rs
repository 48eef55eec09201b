//! Embedding providers.
//!
//! A provider is one tier of the [`crate::EmbeddingChain`]: the remote
//! OpenAI-compatible API and a local LM-Studio-compatible server. Providers
//! report failures as [`EmbeddingError`]; the chain decides what to do next.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Default timeout for embedding requests.
pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Get the model this provider requests.
    fn model(&self) -> &str;

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;

    /// Generate a raw embedding for the given text.
    ///
    /// The returned vector has whatever dimension the backend produces.
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// OpenAI embedding provider.
pub struct OpenAIProvider {
    /// API key.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model to request.
    model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider without a credential.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            client: http_client(DEFAULT_EMBEDDING_TIMEOUT),
            model: "text-embedding-3-small".to_string(),
        }
    }

    /// Set the API key. Empty keys leave the provider unavailable.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(EmbeddingError::ProviderNotConfigured)?;

        debug!("Requesting remote embedding with model: {}", self.model);

        let body = serde_json::json!({
            "input": text,
            "model": self.model
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::QuotaExceeded(error_text));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if error_text.contains("insufficient_quota") {
                return Err(EmbeddingError::QuotaExceeded(error_text));
            }
            return Err(EmbeddingError::ApiRequest {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let result: EmbeddingsResponse = response.json().await?;
        first_embedding(result)
    }
}

/// Local embedding provider speaking the LM Studio HTTP API.
pub struct LocalProvider {
    /// Full embeddings endpoint URL.
    url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model to request.
    model: String,
}

impl LocalProvider {
    /// Create a provider for the server behind a chat-completions URL.
    ///
    /// The embeddings endpoint is derived with [`local_embeddings_url`].
    pub fn new(chat_url: &str) -> Self {
        Self {
            url: local_embeddings_url(chat_url),
            client: http_client(DEFAULT_EMBEDDING_TIMEOUT),
            model: "local-embedding-model".to_string(),
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// The embeddings endpoint this provider posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Requesting local embedding from {}", self.url);

        let body = serde_json::json!({
            "model": self.model,
            "input": text
        });

        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let result: EmbeddingsResponse = response.json().await?;
        first_embedding(result)
    }
}

/// Derive the embeddings endpoint from a local chat-completions URL.
///
/// `http://host/v1/chat/completions` becomes `http://host/v1/embeddings`.
/// A URL without the chat suffix gets `/embeddings` appended.
pub fn local_embeddings_url(chat_url: &str) -> String {
    let trimmed = chat_url.trim_end_matches('/');
    let base = trimmed.strip_suffix("/chat/completions").unwrap_or(trimmed);
    format!("{base}/embeddings")
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

fn first_embedding(response: EmbeddingsResponse) -> Result<Embedding> {
    response
        .data
        .into_iter()
        .next()
        .map(|item| item.embedding)
        .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
}

/// Shared `{data: [{embedding: [...]}]}` response shape.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
