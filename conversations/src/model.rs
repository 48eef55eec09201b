//! Conversation and message records.
//!
//! A conversation exclusively owns its messages. Messages are immutable once
//! created except for an embedding that may be attached later.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Ended,
    Error,
}

impl ConversationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }
}

/// Known metadata fields stored alongside a conversation.
///
/// Serializes to the same flat JSON object the metadata map always had;
/// unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    /// Provider mode active when the conversation last changed mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When `ai_mode` last changed mid-conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switched_at: Option<DateTime<Utc>>,

    /// Last failure diagnostic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// A chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Opaque identifier.
    pub id: String,

    pub title: Option<String>,

    pub started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,

    pub status: ConversationStatus,

    /// AI-generated summary, set when the conversation ends.
    pub ai_summary: Option<String>,

    #[serde(default)]
    pub metadata: ConversationMetadata,
}

impl Conversation {
    /// Create a new active conversation.
    pub fn new(title: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            started_at: Utc::now(),
            ended_at: None,
            status: ConversationStatus::Active,
            ai_summary: None,
            metadata: ConversationMetadata::default(),
        }
    }

    /// The title, or `Conversation {id}` when there is none.
    pub fn display_title(&self) -> String {
        match self.title.as_deref() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => format!("Conversation {}", self.id),
        }
    }

    /// The summary, if present and non-blank.
    pub fn summary(&self) -> Option<&str> {
        self.ai_summary
            .as_deref()
            .filter(|summary| !summary.trim().is_empty())
    }

    pub fn is_active(&self) -> bool {
        self.status == ConversationStatus::Active
    }

    /// Move to `ended`, recording why.
    pub fn end(&mut self, reason: impl Into<String>) {
        let now = Utc::now();
        self.status = ConversationStatus::Ended;
        self.ended_at = Some(now);
        self.metadata.ended_reason = Some(reason.into());
        self.metadata.ended_at = Some(now);
    }

    /// Move to `error`, recording the diagnostic.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = ConversationStatus::Error;
        self.metadata.error = Some(error.into());
        self.metadata.failed_at = Some(Utc::now());
    }

    /// Time between start and end, for ended conversations.
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|ended| ended - self.started_at)
    }
}

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

/// A single chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,

    /// Owning conversation.
    pub conversation_id: String,

    pub sender: Sender,

    pub content: String,

    pub created_at: DateTime<Utc>,

    /// Embedding attached after creation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(
        conversation_id: impl Into<String>,
        sender: Sender,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender,
            content: content.into(),
            created_at: Utc::now(),
            embedding: None,
        }
    }

    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Sender::User, content)
    }

    pub fn ai(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Sender::Ai, content)
    }

    /// Override the creation timestamp.
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
