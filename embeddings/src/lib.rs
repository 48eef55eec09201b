//! # Embeddings
//!
//! Fixed-dimension text embeddings and similarity ranking for Parley.
//!
//! ## Features
//!
//! - **Tiered Generation**: remote API, then a local server, then a
//!   deterministic character-code fallback
//! - **Dimension Normalization**: every vector is padded or truncated to the
//!   configured dimension so vectors from different providers compare
//! - **Similarity Search**: cosine similarity and stable top-k ranking
//! - **Caching**: provider-produced embeddings are reused across searches
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Embedding Chain                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  OpenAIProvider ──► LocalProvider ──► synthetic_embedding       │
//! │        │                  │                   │                 │
//! │        └──────────────────┴───────────────────┘                 │
//! │                           ▼                                     │
//! │   normalize_dimension ──► EmbeddingCache ──► cosine_similarity  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod chain;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod similarity;

pub use cache::{CacheStats, EmbeddingCache};
pub use chain::{EmbeddingChain, EmbeddingOutcome, EmbeddingSource};
pub use error::{EmbeddingError, Result};
pub use normalize::{normalize_dimension, synthetic_embedding};
pub use provider::{EmbeddingProvider, LocalProvider, OpenAIProvider, local_embeddings_url};
pub use similarity::{SimilarityResult, cosine_similarity, find_top_k, round_score};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default dimension every embedding is normalized to.
pub const DEFAULT_DIMENSION: usize = 128;
