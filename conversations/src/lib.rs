//! # Conversations
//!
//! Conversation and message records for Parley, and the store contract the
//! AI layer reads and writes through.
//!
//! Two stores ship with the crate:
//!
//! - [`MemoryStore`]: process-local, used by tests and embedders.
//! - [`JsonStore`]: one JSON file per conversation under a directory.

pub mod error;
pub mod json_store;
pub mod model;
pub mod store;

pub use error::{Result, StoreError};
pub use json_store::JsonStore;
pub use model::{Conversation, ConversationMetadata, ConversationStatus, Message, Sender};
pub use store::{ConversationRecord, ConversationStore, MemoryStore};
