//! Conversation persistence as a directory of JSON files.
//!
//! Each conversation is written with its messages to `{id}.json` under the
//! store root. Writes go through a temp file and a rename so a crash never
//! leaves a half-written record behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::model::{Conversation, Message};
use crate::store::{ConversationRecord, ConversationStore, Records};

/// Store backed by one JSON file per conversation.
pub struct JsonStore {
    /// Root directory for conversation files.
    root: PathBuf,

    /// In-memory copy of every record on disk.
    records: RwLock<Records>,
}

impl JsonStore {
    /// Open a store at the given root directory, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::Storage(format!("{}: {e}", root.display())))?;

        let records = load_all(&root).await?;
        info!("Loaded {} conversations from {}", records.len(), root.display());

        Ok(Self {
            root,
            records: RwLock::new(records),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Persist a staged record and only then apply it in memory.
    async fn commit(&self, records: &mut Records, record: ConversationRecord) -> Result<()> {
        self.save_record(&record).await?;
        records.commit(record);
        Ok(())
    }

    async fn save_record(&self, record: &ConversationRecord) -> Result<()> {
        let path = self.record_path(&record.conversation.id);
        let content = serde_json::to_string_pretty(record)?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, &content)
            .await
            .map_err(|e| StoreError::Storage(format!("{}: {e}", temp_path.display())))?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StoreError::Storage(format!("{}: {e}", path.display())))?;

        debug!("Saved conversation: {}", record.conversation.id);
        Ok(())
    }
}

/// Read every `*.json` record under `root`, oldest conversation first.
async fn load_all(root: &Path) -> Result<Records> {
    let mut entries = fs::read_dir(root)
        .await
        .map_err(|e| StoreError::Storage(format!("{}: {e}", root.display())))?;

    let mut loaded = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            match load_record(&path).await {
                Ok(record) => loaded.push(record),
                Err(e) => warn!("Failed to load conversation file {}: {e}", path.display()),
            }
        }
    }

    loaded.sort_by(|a, b| {
        a.conversation
            .started_at
            .cmp(&b.conversation.started_at)
            .then_with(|| a.conversation.id.cmp(&b.conversation.id))
    });
    Ok(Records::from_records(loaded))
}

async fn load_record(path: &Path) -> Result<ConversationRecord> {
    let content = fs::read_to_string(path).await?;
    let record: ConversationRecord = serde_json::from_str(&content)?;
    Ok(record)
}

#[async_trait]
impl ConversationStore for JsonStore {
    async fn insert_conversation(&self, conversation: Conversation) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.stage_insert(conversation)?;
        self.commit(&mut records, record).await
    }

    async fn update_conversation(&self, conversation: &Conversation) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records.stage_update(conversation)?;
        self.commit(&mut records, record).await
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
        self.commit(&mut records, record).await
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
        self.commit(&mut records, record).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.get(id)?;

        let path = self.record_path(id);
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::Storage(format!("{}: {e}", path.display())))?;

        records.remove(id)?;
        info!("Deleted conversation: {id}");
        Ok(())
    }
}
