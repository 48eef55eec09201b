//! Configuration for the AI service.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};

/// Which provider family answers first.
///
/// Surfaced for observability only; the tier chains decide at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    /// A remote credential is configured.
    OpenAI,
    /// Only the local model server is configured.
    Local,
}

impl AiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for AiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the AI service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Credential for the remote provider. Absence disables the remote tier.
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// Base URL of the remote OpenAI-compatible API.
    pub openai_base_url: String,

    /// Remote chat model.
    pub chat_model: String,

    /// Remote embedding model.
    pub embedding_model: String,

    /// Chat completions URL of the local model server.
    pub local_url: String,

    pub local_chat_model: String,

    pub local_embedding_model: String,

    /// Sampling temperature sent to the local server.
    pub temperature: f64,

    /// Length of every embedding.
    pub embedding_dimension: usize,

    pub chat_timeout_secs: u64,

    pub embedding_timeout_secs: u64,

    /// Summaries embedded at once during semantic search.
    pub search_concurrency: usize,

    /// Whether to cache provider embeddings.
    pub cache_enabled: bool,

    /// Maximum cache size.
    pub cache_max_entries: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            local_url: parley_completion::DEFAULT_LOCAL_URL.to_string(),
            local_chat_model: "local-model".to_string(),
            local_embedding_model: "local-embedding-model".to_string(),
            temperature: 0.7,
            embedding_dimension: parley_embeddings::DEFAULT_DIMENSION,
            chat_timeout_secs: 30,
            embedding_timeout_secs: 10,
            search_concurrency: 4,
            cache_enabled: true,
            cache_max_entries: 10000,
        }
    }
}

impl AiConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the process environment.
    ///
    /// Recognized variables: `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `LM_STUDIO_URL` and `EMBEDDING_DIMENSION`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        config.openai_api_key = value("OPENAI_API_KEY");
        if let Some(url) = value("OPENAI_BASE_URL") {
            config.openai_base_url = url;
        }
        if let Some(url) = value("LM_STUDIO_URL") {
            config.local_url = url;
        }
        if let Some(raw) = value("EMBEDDING_DIMENSION") {
            config.embedding_dimension = raw.parse().map_err(|e| {
                AiError::Config(format!("EMBEDDING_DIMENSION must be a positive integer: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check values that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimension == 0 {
            return Err(AiError::Config(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if self.search_concurrency == 0 {
            return Err(AiError::Config(
                "search concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the remote credential. An empty key disables the remote tier.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.openai_api_key = (!key.is_empty()).then_some(key);
        self
    }

    pub fn with_openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = url.into();
        self
    }

    /// Set the local chat completions URL.
    pub fn with_local_url(mut self, url: impl Into<String>) -> Self {
        self.local_url = url.into();
        self
    }

    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = dimension;
        self
    }

    pub fn with_chat_timeout_secs(mut self, secs: u64) -> Self {
        self.chat_timeout_secs = secs;
        self
    }

    pub fn with_embedding_timeout_secs(mut self, secs: u64) -> Self {
        self.embedding_timeout_secs = secs;
        self
    }

    pub fn with_search_concurrency(mut self, concurrency: usize) -> Self {
        self.search_concurrency = concurrency;
        self
    }

    /// Enable or disable the embedding cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// `openai` when a credential is present, else `local`.
    pub fn mode(&self) -> AiMode {
        if self.remote_enabled() {
            AiMode::OpenAI
        } else {
            AiMode::Local
        }
    }

    pub fn remote_enabled(&self) -> bool {
        self.openai_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = AiConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.mode(), AiMode::Local);
        assert_eq!(config.local_url, "http://localhost:1234/v1/chat/completions");
        assert_eq!(config.embedding_dimension, 128);
        assert_eq!(config.chat_timeout(), Duration::from_secs(30));
        assert_eq!(config.embedding_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_environment_overrides() {
        let config = AiConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LM_STUDIO_URL", "http://gpu-box:1234/v1/chat/completions"),
            ("EMBEDDING_DIMENSION", "256"),
        ]))
        .unwrap();

        assert_eq!(config.mode(), AiMode::OpenAI);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.local_url, "http://gpu-box:1234/v1/chat/completions");
        assert_eq!(config.embedding_dimension, 256);
    }

    #[test]
    fn test_blank_key_means_local_mode() {
        let config = AiConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap();
        assert_eq!(config.mode(), AiMode::Local);
        assert!(!config.remote_enabled());
    }

    #[test]
    fn test_invalid_dimension_is_rejected() {
        for raw in ["abc", "0", "-3"] {
            let err = AiConfig::from_lookup(lookup(&[("EMBEDDING_DIMENSION", raw)])).unwrap_err();
            assert!(matches!(err, AiError::Config(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = AiConfig::new().with_api_key("sk-secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
        assert_eq!(AiMode::OpenAI.to_string(), "openai");
    }
}
