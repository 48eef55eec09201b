//! Completion providers.
//!
//! Two OpenAI-compatible chat backends: the hosted API, which needs a bearer
//! credential, and a local LM-Studio-style server, which does not.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{CompletionError, Result};
use crate::message::ChatMessage;

/// Default timeout for completion requests.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default local chat-completions endpoint.
pub const DEFAULT_LOCAL_URL: &str = "http://localhost:1234/v1/chat/completions";

/// Trait for completion providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Get the name of this provider.
    fn name(&self) -> &str;

    /// Check if the provider can be called at all.
    fn is_available(&self) -> bool;

    /// Send the ordered messages and return the trimmed reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// OpenAI chat-completions provider.
pub struct OpenAIChatProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    model: String,
}

impl OpenAIChatProvider {
    /// Create a new provider without a credential.
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            client: http_client(DEFAULT_COMPLETION_TIMEOUT),
            model: "gpt-3.5-turbo".to_string(),
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

impl Default for OpenAIChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for OpenAIChatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(CompletionError::ProviderNotConfigured)?;

        debug!(
            "Requesting remote completion with model {} ({} messages)",
            self.model,
            messages.len()
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || error_text.contains("insufficient_quota")
            {
                return Err(CompletionError::QuotaExceeded(error_text));
            }
            return Err(CompletionError::Status {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let result: ChatCompletionResponse = response.json().await?;
        result.into_reply()
    }
}

/// Local chat provider speaking the LM Studio HTTP API.
pub struct LocalChatProvider {
    url: String,
    client: reqwest::Client,
    model: String,
    temperature: f64,
}

impl LocalChatProvider {
    /// Create a provider posting to the given chat-completions URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: http_client(DEFAULT_COMPLETION_TIMEOUT),
            model: "local-model".to_string(),
            temperature: 0.7,
        }
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// The endpoint this provider posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for LocalChatProvider {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_URL)
    }
}

#[async_trait]
impl CompletionProvider for LocalChatProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Requesting local completion from {}", self.url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let result: ChatCompletionResponse = response.json().await?;
        result.into_reply()
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// `{choices: [{message: {content}}]}` response shape.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn into_reply(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| CompletionError::InvalidResponse("No reply in response".to_string()))
    }
}
