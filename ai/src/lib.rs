//! # AI Service
//!
//! Provider orchestration and the chat session workflow for Parley.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          ChatSessions                           │
//! │          start · send · end · idle sweep · stats · status       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                           AiService                             │
//! │    chat_with_context · summarize_conversation · semantic_search │
//! ├─────────────────────┬─────────────────────┬─────────────────────┤
//! │   CompletionChain   │   EmbeddingChain    │  ConversationStore  │
//! │  remote ─► local    │ remote ─► local ─►  │   memory / JSON     │
//! │    ─► sentinel      │     synthetic       │                     │
//! └─────────────────────┴─────────────────────┴─────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use parley_ai::{AiConfig, AiService, ChatSessions};
//! use parley_conversations::MemoryStore;
//!
//! let config = AiConfig::from_env()?;
//! let service = AiService::from_config(&config, Arc::new(MemoryStore::new()))?;
//! let sessions = ChatSessions::new(Arc::new(service));
//!
//! let conversation = sessions.start_conversation(None).await?;
//! let exchange = sessions.send_message(&conversation.id, "Hello!").await?;
//! ```

pub mod config;
pub mod error;
pub mod service;
pub mod session;

pub use config::{AiConfig, AiMode};
pub use error::{AiError, Result};
pub use service::{AiService, ConversationSummary, DEFAULT_TOP_K, SearchHit, SUMMARY_INSTRUCTION};
pub use session::{
    ChatSessions, DEFAULT_IDLE_TIMEOUT, DEFAULT_TITLE, DashboardStats, Exchange, SystemStatus,
};

// Re-export from dependencies for convenience
pub use parley_completion::{FailureReply, SYSTEM_INSTRUCTION};
pub use parley_conversations::{Conversation, ConversationStatus, ConversationStore, Message};
