//! Embedding cache to avoid re-embedding unchanged text.
//!
//! Semantic search embeds every stored summary on every query, so repeated
//! searches over the same conversations hit the cache instead of a provider.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::Embedding;

/// Cache entry for an embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The normalized embedding vector.
    pub embedding: Embedding,

    /// Model used to generate the embedding.
    pub model: String,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,

    /// Insertion order, used for eviction.
    sequence: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<u64, CacheEntry>,
    next_sequence: u64,
}

/// In-memory embedding cache keyed by text, model and dimension.
#[derive(Clone)]
pub struct EmbeddingCache {
    state: Arc<RwLock<CacheState>>,

    /// Maximum cache size.
    max_entries: usize,
}

impl EmbeddingCache {
    /// Create a new in-memory cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            max_entries,
        }
    }

    fn hash_key(text: &str, model: &str, dimension: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        model.hash(&mut hasher);
        dimension.hash(&mut hasher);
        hasher.finish()
    }

    /// Get an embedding from the cache.
    pub async fn get(&self, text: &str, model: &str, dimension: usize) -> Option<Embedding> {
        let key = Self::hash_key(text, model, dimension);
        let state = self.state.read().await;
        state.entries.get(&key).map(|e| e.embedding.clone())
    }

    /// Put an embedding in the cache, evicting the oldest entry when full.
    pub async fn put(&self, text: &str, model: &str, embedding: Embedding) {
        if self.max_entries == 0 {
            return;
        }

        let key = Self::hash_key(text, model, embedding.len());
        let mut state = self.state.write().await;

        if state.entries.len() >= self.max_entries && !state.entries.contains_key(&key) {
            if let Some(oldest_key) = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.sequence)
                .map(|(k, _)| *k)
            {
                state.entries.remove(&oldest_key);
            }
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.insert(
            key,
            CacheEntry {
                embedding,
                model: model.to_string(),
                created_at: Utc::now(),
                sequence,
            },
        );
        debug!("Cached embedding for text (model: {model})");
    }

    /// Check if an embedding is cached.
    pub async fn contains(&self, text: &str, model: &str, dimension: usize) -> bool {
        let key = Self::hash_key(text, model, dimension);
        self.state.read().await.entries.contains_key(&key)
    }

    /// Clear the entire cache.
    pub async fn clear(&self) {
        self.state.write().await.entries.clear();
        info!("Cleared embedding cache");
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len(),
            max_entries: self.max_entries,
            models: state
                .entries
                .values()
                .map(|e| e.model.clone())
                .collect::<HashSet<_>>()
                .into_iter()
                .collect(),
        }
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Models with cached embeddings.
    pub models: Vec<String>,
}
