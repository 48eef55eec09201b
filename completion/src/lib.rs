//! # Completion
//!
//! Chat completion for Parley with a remote-to-local fallback chain.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Completion Chain                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  OpenAIChatProvider ──► LocalChatProvider ──► FailureReply      │
//! │   (needs API key)        (LM Studio)          (sentinel text)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The chain never returns an error: when every tier fails, the reply is
//! one of the three [`FailureReply`] strings.

pub mod chain;
pub mod error;
pub mod message;
pub mod provider;

pub use chain::{CompletionChain, CompletionOutcome, FailureReply};
pub use error::{CompletionError, Result};
pub use message::{ChatMessage, ChatRole, SYSTEM_INSTRUCTION};
pub use provider::{
    CompletionProvider, DEFAULT_COMPLETION_TIMEOUT, DEFAULT_LOCAL_URL, LocalChatProvider,
    OpenAIChatProvider,
};
