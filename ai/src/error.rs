//! Error types for the AI service.

use thiserror::Error;

/// Result type alias for AI service operations.
pub type Result<T> = std::result::Result<T, AiError>;

/// Errors that can occur in the AI service.
///
/// Provider failures never show up here: the completion and embedding chains
/// absorb them.
#[derive(Error, Debug)]
pub enum AiError {
    /// Conversation store error.
    #[error("store error: {0}")]
    Store(#[from] parley_conversations::StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The conversation has ended and takes no more messages.
    #[error("conversation has ended: {0}")]
    ConversationEnded(String),

    /// Message text was blank after trimming.
    #[error("message content is empty")]
    EmptyMessage,
}
