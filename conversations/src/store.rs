//! The conversation store contract and an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::model::{Conversation, Message};

/// Read/write access to conversation and message records.
///
/// Implementations keep conversations in insertion order and return a
/// conversation's messages ordered by creation time, ties broken by
/// insertion order.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Add a new conversation. Fails if the id is taken.
    async fn insert_conversation(&self, conversation: Conversation) -> Result<()>;

    /// Replace an existing conversation record. Messages are untouched.
    async fn update_conversation(&self, conversation: &Conversation) -> Result<()>;

    async fn get_conversation(&self, id: &str) -> Result<Conversation>;

    /// All conversations, oldest insertion first.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Add a message to its owning conversation.
    async fn append_message(&self, message: Message) -> Result<()>;

    /// Messages of a conversation in creation order.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Attach an embedding to an existing message.
    async fn set_message_embedding(
        &self,
        conversation_id: &str,
        message_id: &str,
        embedding: Vec<f32>,
    ) -> Result<()>;

    /// Remove a conversation together with its messages.
    async fn delete_conversation(&self, id: &str) -> Result<()>;
}

/// A conversation and the messages it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation: Conversation,

    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationRecord {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            messages: Vec::new(),
        }
    }

    /// Insert keeping creation order; equal timestamps stay in insertion order.
    fn push_message(&mut self, message: Message) {
        let at = self
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(at, message);
    }
}

/// Ordered set of records shared by the store implementations.
#[derive(Debug, Default)]
pub(crate) struct Records {
    order: Vec<String>,
    entries: HashMap<String, ConversationRecord>,
}

impl Records {
    pub(crate) fn from_records(records: impl IntoIterator<Item = ConversationRecord>) -> Self {
        let mut this = Self::default();
        for record in records {
            let id = record.conversation.id.clone();
            if this.entries.insert(id.clone(), record).is_none() {
                this.order.push(id);
            }
        }
        this
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn get(&self, id: &str) -> Result<&ConversationRecord> {
        self.entries
            .get(id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    pub(crate) fn conversations(&self) -> Vec<Conversation> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|record| record.conversation.clone())
            .collect()
    }

    // The `stage_*` methods build the record a change would produce without
    // applying it. Callers persist the staged record, then `commit` it.

    pub(crate) fn stage_insert(&self, conversation: Conversation) -> Result<ConversationRecord> {
        if self.entries.contains_key(&conversation.id) {
            return Err(StoreError::ConversationExists(conversation.id));
        }
        Ok(ConversationRecord::new(conversation))
    }

    pub(crate) fn stage_update(&self, conversation: &Conversation) -> Result<ConversationRecord> {
        let mut record = self.get(&conversation.id)?.clone();
        record.conversation = conversation.clone();
        Ok(record)
    }

    pub(crate) fn stage_append(&self, message: Message) -> Result<ConversationRecord> {
        let mut record = self.get(&message.conversation_id)?.clone();
        debug!(
            conversation_id = %message.conversation_id,
            sender = message.sender.as_str(),
            "Appending message"
        );
        record.push_message(message);
        Ok(record)
    }

    pub(crate) fn stage_embedding(
        &self,
        conversation_id: &str,
        message_id: &str,
        embedding: Vec<f32>,
    ) -> Result<ConversationRecord> {
        let mut record = self.get(conversation_id)?.clone();
        let message = record
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        message.embedding = Some(embedding);
        Ok(record)
    }

    /// Apply a staged record, keeping the position of an existing one.
    pub(crate) fn commit(&mut self, record: ConversationRecord) {
        let id = record.conversation.id.clone();
        if self.entries.insert(id.clone(), record).is_none() {
            self.order.push(id);
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> Result<ConversationRecord> {
        let record = self
            .entries
            .remove(id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;
        self.order.retain(|existing| existing != id);
        Ok(record)
    }
}

/// Process-local store, lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn insert_conversation(&self, conversation: Conversation) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.stage_insert(conversation)?;
        records.commit(record);
        Ok(())
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.stage_update(conversation)?;
        records.commit(record);
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Conversation> {
        Ok(self.records.read().await.get(id)?.conversation.clone())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.records.read().await.conversations())
    }

    async fn append_message(&self, message: Message) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.stage_append(message)?;
        records.commit(record);
        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        Ok(self.records.read().await.get(conversation_id)?.messages.clone())
    }

    async fn set_message_embedding(
        &self,
        conversation_id: &str,
        message_id: &str,
        embedding: Vec<f32>,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.stage_embedding(conversation_id, message_id, embedding)?;
        records.commit(record);
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.records.write().await.remove(id)?;
        Ok(())
    }
}
