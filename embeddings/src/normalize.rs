//! Dimension normalization for vectors coming from heterogeneous providers.

use crate::Embedding;

/// Resize `vector` to exactly `dim` elements.
///
/// Shorter vectors are right-padded with zeros, longer ones keep their first
/// `dim` elements. An empty input yields `dim` zeros.
pub fn normalize_dimension(vector: &[f32], dim: usize) -> Embedding {
    let mut out: Embedding = vector.iter().copied().take(dim).collect();
    out.resize(dim, 0.0);
    out
}

/// Build the character-code vector used when no provider answers.
///
/// Each of the first `dim` characters maps to `code_point / 1000.0`. The
/// result carries no semantics beyond literal character overlap.
pub fn synthetic_embedding(text: &str, dim: usize) -> Embedding {
    let codes: Vec<f32> = text
        .chars()
        .take(dim)
        .map(|c| u32::from(c) as f32 / 1000.0)
        .collect();
    normalize_dimension(&codes, dim)
}
