//! Tiered embedding generation.
//!
//! [`EmbeddingChain`] tries each configured provider in order and stops at
//! the first success. When every provider fails it degrades to
//! [`synthetic_embedding`], so [`EmbeddingChain::embed`] always returns a
//! vector of the configured dimension.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::EmbeddingCache;
use crate::normalize::{normalize_dimension, synthetic_embedding};
use crate::provider::EmbeddingProvider;
use crate::{DEFAULT_DIMENSION, Embedding};

/// Where an embedding came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "provider")]
pub enum EmbeddingSource {
    /// Blank input; no provider was asked.
    Empty,
    /// Served from the cache, originally produced by the named provider.
    Cached(String),
    /// Produced by the named provider.
    Provider(String),
    /// Character-code fallback.
    Synthetic,
}

/// An embedding together with its source.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    /// The normalized embedding.
    pub embedding: Embedding,

    /// Which tier produced it.
    pub source: EmbeddingSource,
}

/// Ordered list of embedding providers ending in a synthetic fallback.
pub struct EmbeddingChain {
    tiers: Vec<Arc<dyn EmbeddingProvider>>,
    dimension: usize,
    cache: Option<EmbeddingCache>,
}

impl EmbeddingChain {
    /// Create an empty chain producing vectors of `dimension` elements.
    pub fn new(dimension: usize) -> Self {
        Self {
            tiers: Vec::new(),
            dimension,
            cache: None,
        }
    }

    /// Append a provider as the next tier.
    pub fn with_tier(self, provider: impl EmbeddingProvider + 'static) -> Self {
        self.with_shared_tier(Arc::new(provider))
    }

    /// Append a shared provider as the next tier.
    pub fn with_shared_tier(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.tiers.push(provider);
        self
    }

    /// Attach a cache for provider-produced embeddings.
    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The dimension every returned vector has.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The attached cache, if any.
    pub fn cache(&self) -> Option<&EmbeddingCache> {
        self.cache.as_ref()
    }

    /// Embed `text`. Never fails.
    pub async fn embed(&self, text: &str) -> Embedding {
        self.embed_detailed(text).await.embedding
    }

    /// Embed `text` and report which tier answered.
    pub async fn embed_detailed(&self, text: &str) -> EmbeddingOutcome {
        if text.trim().is_empty() {
            return EmbeddingOutcome {
                embedding: vec![0.0; self.dimension],
                source: EmbeddingSource::Empty,
            };
        }

        for tier in &self.tiers {
            if !tier.is_available() {
                debug!("Skipping unavailable embedding provider: {}", tier.name());
                continue;
            }

            if let Some(cache) = &self.cache {
                if let Some(embedding) = cache.get(text, tier.model(), self.dimension).await {
                    debug!("Cache hit for {} embedding", tier.name());
                    return EmbeddingOutcome {
                        embedding,
                        source: EmbeddingSource::Cached(tier.name().to_string()),
                    };
                }
            }

            match tier.embed(text).await {
                Ok(raw) => {
                    let raw_dimension = raw.len();
                    let embedding = normalize_dimension(&raw, self.dimension);
                    info!(
                        provider = tier.name(),
                        raw_dimension,
                        dimension = self.dimension,
                        "Generated embedding"
                    );
                    if let Some(cache) = &self.cache {
                        cache.put(text, tier.model(), embedding.clone()).await;
                    }
                    return EmbeddingOutcome {
                        embedding,
                        source: EmbeddingSource::Provider(tier.name().to_string()),
                    };
                }
                Err(err) if err.is_quota() => {
                    warn!(
                        provider = tier.name(),
                        "Embedding quota exceeded, falling back: {err}"
                    );
                }
                Err(err) => {
                    warn!(
                        provider = tier.name(),
                        "Embedding generation failed, falling back: {err}"
                    );
                }
            }
        }

        warn!("Using synthetic embedding fallback");
        EmbeddingOutcome {
            embedding: synthetic_embedding(text, self.dimension),
            source: EmbeddingSource::Synthetic,
        }
    }
}

impl Default for EmbeddingChain {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}
