//! Error types for completion providers.

use thiserror::Error;

use crate::chain::FailureReply;

/// Result type alias for completion operations.
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Errors a single completion tier can report.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Provider not configured.
    #[error("completion provider not configured")]
    ProviderNotConfigured,

    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The provider answered but the reply text was missing.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Quota exhausted or rate limit exceeded.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Request-level failure: timeout, refused connection, undecodable body.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CompletionError {
    /// The user-visible reply used when this error ends the chain.
    pub fn failure_reply(&self) -> FailureReply {
        match self {
            Self::Status { .. } | Self::QuotaExceeded(_) => FailureReply::ProviderError,
            Self::InvalidResponse(_) => FailureReply::InvalidResponse,
            Self::ProviderNotConfigured | Self::Http(_) => FailureReply::Unavailable,
        }
    }
}
