//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::Embedding;

/// Added to the magnitude product so all-zero vectors score 0.0.
const EPSILON: f32 = 1e-9;

/// Compute the cosine similarity between two embeddings.
///
/// Returns 0.0 when either vector is empty. Vectors of different length are
/// both truncated to the shorter length before scoring; no re-alignment is
/// attempted.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    dot_product / (magnitude_a * magnitude_b + EPSILON)
}

/// Round a score to three decimal places.
pub fn round_score(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}

/// A similarity search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// ID of the matched item.
    pub id: String,

    /// Similarity score, rounded to three decimals.
    pub score: f32,
}

impl SimilarityResult {
    /// Create a new similarity result.
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Find the top-k most similar embeddings.
///
/// Candidates with equal scores keep their input order.
pub fn find_top_k(
    query: &[f32],
    candidates: &[(String, Embedding)],
    k: usize,
) -> Vec<SimilarityResult> {
    let mut scores: Vec<(OrderedFloat<f32>, &str)> = candidates
        .iter()
        .map(|(id, embedding)| {
            (
                OrderedFloat(cosine_similarity(query, embedding)),
                id.as_str(),
            )
        })
        .collect();

    // Stable sort by score descending
    scores.sort_by_key(|(score, _)| Reverse(*score));

    scores
        .into_iter()
        .take(k)
        .map(|(score, id)| SimilarityResult::new(id, round_score(score.0)))
        .collect()
}
