//! Error types for conversation storage.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in a conversation store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Conversation not found.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Message not found.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Conversation already exists.
    #[error("conversation already exists: {0}")]
    ConversationExists(String),

    /// Backend-specific storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
