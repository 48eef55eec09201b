//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors a single embedding tier can report.
///
/// None of these escape [`crate::EmbeddingChain`]; they decide which
/// diagnostic is logged before the chain moves on to the next tier.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// API request failed.
    #[error("API request failed with status {status}: {message}")]
    ApiRequest { status: u16, message: String },

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Quota exhausted or rate limit exceeded.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether the failure is a quota or HTTP 429 signal.
    pub fn is_quota(&self) -> bool {
        match self {
            Self::QuotaExceeded(_) => true,
            Self::ApiRequest { status, message } => {
                *status == 429 || message.contains("insufficient_quota")
            }
            Self::Http(err) => err.status().is_some_and(|s| s.as_u16() == 429),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_detection() {
        assert!(EmbeddingError::QuotaExceeded("slow down".into()).is_quota());
        assert!(
            EmbeddingError::ApiRequest {
                status: 429,
                message: String::new()
            }
            .is_quota()
        );
        assert!(
            EmbeddingError::ApiRequest {
                status: 403,
                message: r#"{"error":{"code":"insufficient_quota"}}"#.into()
            }
            .is_quota()
        );
        assert!(
            !EmbeddingError::ApiRequest {
                status: 500,
                message: "boom".into()
            }
            .is_quota()
        );
        assert!(!EmbeddingError::ProviderNotConfigured.is_quota());
    }
}
