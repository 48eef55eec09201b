//! Conversation lifecycle on top of [`AiService`].
//!
//! [`ChatSessions`] starts, continues and ends conversations, persisting
//! each turn and keeping conversation status in step with the providers.
//! At most one conversation is active at a time.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use parley_conversations::{Conversation, ConversationStatus, Message};
use parley_embeddings::EmbeddingSource;

use crate::config::AiMode;
use crate::error::{AiError, Result};
use crate::service::{AiService, SearchHit};

/// Title given to conversations started without one.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Idle time after which [`ChatSessions::end_idle_conversations`] ends a
/// conversation by default.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::minutes(10);

/// Number of conversations listed in [`DashboardStats::recent`].
const RECENT_LIMIT: usize = 5;

/// A user turn and the reply it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: Message,
    pub ai: Message,
}

/// Aggregate numbers over all stored conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    pub active: usize,
    pub ended: usize,
    pub error: usize,

    /// Mean length of conversations with an end time, in minutes.
    pub avg_duration_mins: f64,

    /// Most recently started conversations, newest first.
    pub recent: Vec<Conversation>,
}

/// Provider configuration as seen by operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub ai_mode: AiMode,
    pub openai_enabled: bool,
    pub local_url: String,
    pub embedding_dimension: usize,
}

/// Conversation workflow backed by an [`AiService`].
pub struct ChatSessions {
    service: Arc<AiService>,

    /// Serializes lifecycle changes that touch more than one conversation.
    lifecycle: Mutex<()>,
}

impl ChatSessions {
    pub fn new(service: Arc<AiService>) -> Self {
        Self {
            service,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn service(&self) -> &Arc<AiService> {
        &self.service
    }

    /// End any active conversation and start a new one.
    pub async fn start_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        let _guard = self.lifecycle.lock().await;
        self.end_other_active(None).await?;

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE);
        let mut conversation = Conversation::new(Some(title.to_string()));
        conversation.metadata.ai_mode = Some(self.service.mode().as_str().to_string());
        conversation.metadata.started_at = Some(conversation.started_at);

        self.service
            .store()
            .insert_conversation(conversation.clone())
            .await?;
        info!(conversation_id = %conversation.id, "Started conversation");
        Ok(conversation)
    }

    /// Store a user turn, obtain the reply and store it too.
    ///
    /// Ended conversations are rejected. A failure sentinel reply is stored
    /// like any other reply and puts the conversation into the `error`
    /// state. A successful reply makes the conversation the active one.
    ///
    /// The lifecycle lock is held for the whole exchange, so starting or
    /// ending conversations waits for the reply.
    pub async fn send_message(&self, conversation_id: &str, content: &str) -> Result<Exchange> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AiError::EmptyMessage);
        }

        let _guard = self.lifecycle.lock().await;
        let store = self.service.store();
        let conversation = store.get_conversation(conversation_id).await?;
        if conversation.status == ConversationStatus::Ended {
            return Err(AiError::ConversationEnded(conversation.id));
        }
        let mut user = Message::user(&conversation.id, content);

        // History is read before the new turn is stored.
        let outcome = self
            .service
            .chat_with_context_detailed(&conversation, content)
            .await?;
        store.append_message(user.clone()).await?;
        self.attach_embedding(&mut user).await?;

        let mut ai = Message::ai(&conversation.id, outcome.reply);
        store.append_message(ai.clone()).await?;
        self.attach_embedding(&mut ai).await?;

        let mut conversation = store.get_conversation(&conversation.id).await?;
        let mode = self.service.mode().as_str();
        if conversation.metadata.ai_mode.as_deref() != Some(mode) {
            conversation.metadata.ai_mode = Some(mode.to_string());
            conversation.metadata.switched_at = Some(Utc::now());
        }

        match outcome.failure {
            Some(failure) => {
                warn!(conversation_id = %conversation.id, ?failure, "AI reply failed");
                conversation.fail(failure.message());
            }
            None => {
                if !conversation.is_active() {
                    self.end_other_active(Some(&conversation.id)).await?;
                }
                conversation.status = ConversationStatus::Active;
            }
        }
        store.update_conversation(&conversation).await?;

        Ok(Exchange { user, ai })
    }

    /// End a conversation at the user's request and store its summary.
    ///
    /// Ending an already ended conversation returns it unchanged. When no
    /// provider can summarize, the summary stays unset and the conversation
    /// is left out of search.
    pub async fn end_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        let _guard = self.lifecycle.lock().await;
        let store = self.service.store();
        let mut conversation = store.get_conversation(conversation_id).await?;
        if conversation.status == ConversationStatus::Ended {
            return Ok(conversation);
        }

        conversation.end("user_ended");
        let summary = self.service.summarize_conversation(&conversation).await?;
        match summary.failure {
            Some(failure) => {
                warn!(conversation_id = %conversation.id, ?failure, "Summary unavailable");
            }
            None => {
                conversation.ai_summary = Some(summary.summary);
                conversation.metadata.sentiment = Some(summary.sentiment);
                conversation.metadata.keywords = summary.keywords;
            }
        }

        store.update_conversation(&conversation).await?;
        info!(conversation_id = %conversation.id, "Ended conversation");
        Ok(conversation)
    }

    /// End active conversations with no activity for `idle`.
    ///
    /// Activity is the latest message, or the start time for conversations
    /// without messages. No summary is generated. Returns how many
    /// conversations were ended.
    pub async fn end_idle_conversations(&self, idle: Duration) -> Result<usize> {
        let _guard = self.lifecycle.lock().await;
        let store = self.service.store();
        let cutoff = Utc::now() - idle;

        let mut ended = 0;
        for mut conversation in store.list_conversations().await? {
            if !conversation.is_active() {
                continue;
            }
            let last_activity: DateTime<Utc> = store
                .messages(&conversation.id)
                .await?
                .last()
                .map_or(conversation.started_at, |m| m.created_at);
            if last_activity < cutoff {
                conversation.end("idle_timeout");
                store.update_conversation(&conversation).await?;
                ended += 1;
            }
        }

        info!("{ended} conversations auto-ended");
        Ok(ended)
    }

    /// All conversations, newest first.
    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        let mut conversations = self.service.store().list_conversations().await?;
        conversations.sort_by_key(|c| Reverse(c.started_at));
        Ok(conversations)
    }

    pub async fn conversation(&self, conversation_id: &str) -> Result<Conversation> {
        Ok(self.service.store().get_conversation(conversation_id).await?)
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        Ok(self.service.store().messages(conversation_id).await?)
    }

    /// Search ended conversations by summary.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        self.service.semantic_search(query, top_k).await
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let conversations = self.conversations().await?;
        let count = |status: ConversationStatus| {
            conversations
                .iter()
                .filter(|c| c.status == status)
                .count()
        };

        let durations: Vec<Duration> = conversations
            .iter()
            .filter_map(Conversation::duration)
            .collect();
        let avg_duration_mins = if durations.is_empty() {
            0.0
        } else {
            let total_ms: i64 = durations.iter().map(Duration::num_milliseconds).sum();
            let minutes = total_ms as f64 / durations.len() as f64 / 60_000.0;
            (minutes * 100.0).round() / 100.0
        };

        Ok(DashboardStats {
            total: conversations.len(),
            active: count(ConversationStatus::Active),
            ended: count(ConversationStatus::Ended),
            error: count(ConversationStatus::Error),
            avg_duration_mins,
            recent: conversations.iter().take(RECENT_LIMIT).cloned().collect(),
        })
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            ai_mode: self.service.mode(),
            openai_enabled: self.service.remote_enabled(),
            local_url: self.service.local_url().to_string(),
            embedding_dimension: self.service.embeddings().dimension(),
        }
    }

    /// End every active conversation except `keep`. Callers hold the
    /// lifecycle lock.
    async fn end_other_active(&self, keep: Option<&str>) -> Result<()> {
        let store = self.service.store();
        let now = Utc::now();
        for mut previous in store.list_conversations().await? {
            if previous.is_active() && Some(previous.id.as_str()) != keep {
                previous.status = ConversationStatus::Ended;
                previous.ended_at = Some(now);
                store.update_conversation(&previous).await?;
                info!(conversation_id = %previous.id, "Ended previous active conversation");
            }
        }
        Ok(())
    }

    /// Embed a stored message when a remote provider is configured.
    ///
    /// Only vectors produced by a provider are kept; a synthetic fallback
    /// leaves the message without an embedding.
    async fn attach_embedding(&self, message: &mut Message) -> Result<()> {
        if !self.service.remote_enabled() {
            return Ok(());
        }

        let outcome = self
            .service
            .embeddings()
            .embed_detailed(&message.content)
            .await;
        match outcome.source {
            EmbeddingSource::Provider(_) | EmbeddingSource::Cached(_) => {
                self.service
                    .store()
                    .set_message_embedding(
                        &message.conversation_id,
                        &message.id,
                        outcome.embedding.clone(),
                    )
                    .await?;
                message.embedding = Some(outcome.embedding);
            }
            EmbeddingSource::Empty | EmbeddingSource::Synthetic => {
                debug!(message_id = %message.id, "No provider embedding for message");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parley_completion::{ChatMessage, CompletionChain, CompletionError, CompletionProvider};
    use parley_conversations::{ConversationStore, MemoryStore};
    use parley_embeddings::EmbeddingChain;
    use pretty_assertions::assert_eq;

    use super::*;

    struct Fixed(std::result::Result<&'static str, fn() -> CompletionError>);

    #[async_trait]
    impl CompletionProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> parley_completion::Result<String> {
            match &self.0 {
                Ok(reply) => Ok(reply.to_string()),
                Err(make) => Err(make()),
            }
        }
    }

    fn sessions(store: Arc<MemoryStore>, provider: Fixed) -> ChatSessions {
        let service = AiService::new(
            store,
            CompletionChain::new().with_tier(provider),
            EmbeddingChain::new(8),
        );
        ChatSessions::new(Arc::new(service))
    }

    fn replying(reply: &'static str) -> Fixed {
        Fixed(Ok(reply))
    }

    #[tokio::test]
    async fn test_start_ends_previous_active() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), replying("hi"));

        let first = sessions.start_conversation(None).await.unwrap();
        let second = sessions.start_conversation(Some("Second")).await.unwrap();

        let first = store.get_conversation(&first.id).await.unwrap();
        assert_eq!(first.status, ConversationStatus::Ended);
        assert!(first.ended_at.is_some());
        assert_eq!(first.title.as_deref(), Some(DEFAULT_TITLE));

        assert_eq!(second.status, ConversationStatus::Active);
        assert_eq!(second.metadata.ai_mode.as_deref(), Some("local"));
        assert_eq!(second.metadata.started_at, Some(second.started_at));
    }

    #[tokio::test]
    async fn test_send_rejects_blank_message() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), replying("hi"));
        let conversation = sessions.start_conversation(None).await.unwrap();

        let err = sessions
            .send_message(&conversation.id, "  \n ")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::EmptyMessage));
        assert!(store.messages(&conversation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_stores_both_turns() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), replying("Hello there!"));
        let conversation = sessions.start_conversation(None).await.unwrap();

        let exchange = sessions
            .send_message(&conversation.id, "  Hi  ")
            .await
            .unwrap();
        assert_eq!(exchange.user.content, "Hi");
        assert_eq!(exchange.ai.content, "Hello there!");

        let stored = store.messages(&conversation.id).await.unwrap();
        assert_eq!(stored, vec![exchange.user, exchange.ai]);
        let conversation = store.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(conversation.status, ConversationStatus::Active);
        assert_eq!(conversation.metadata.switched_at, None);
    }

    #[tokio::test]
    async fn test_send_records_mode_switch() {
        let store = Arc::new(MemoryStore::new());
        let mut conversation = Conversation::new(None);
        conversation.metadata.ai_mode = Some("openai".into());
        store.insert_conversation(conversation.clone()).await.unwrap();

        let sessions = sessions(store.clone(), replying("ok"));
        sessions.send_message(&conversation.id, "hi").await.unwrap();

        let conversation = store.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(conversation.metadata.ai_mode.as_deref(), Some("local"));
        assert!(conversation.metadata.switched_at.is_some());
    }

    #[tokio::test]
    async fn test_sentinel_reply_marks_error() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(
            store.clone(),
            Fixed(Err(|| CompletionError::Status {
                status: 500,
                message: "boom".into(),
            })),
        );
        let conversation = sessions.start_conversation(None).await.unwrap();

        let exchange = sessions
            .send_message(&conversation.id, "Hi")
            .await
            .unwrap();
        assert_eq!(exchange.ai.content, "Local AI model returned an error.");

        let conversation = store.get_conversation(&conversation.id).await.unwrap();
        assert_eq!(conversation.status, ConversationStatus::Error);
        assert_eq!(
            conversation.metadata.error.as_deref(),
            Some("Local AI model returned an error.")
        );
        assert!(conversation.metadata.failed_at.is_some());
    }

    #[tokio::test]
    async fn test_end_stores_summary_once() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), replying("A short chat."));
        let conversation = sessions.start_conversation(None).await.unwrap();
        sessions.send_message(&conversation.id, "Hi").await.unwrap();

        let ended = sessions.end_conversation(&conversation.id).await.unwrap();
        assert_eq!(ended.status, ConversationStatus::Ended);
        assert_eq!(ended.ai_summary.as_deref(), Some("A short chat."));
        assert_eq!(ended.metadata.ended_reason.as_deref(), Some("user_ended"));
        assert_eq!(ended.metadata.sentiment.as_deref(), Some("neutral"));
        assert!(ended.metadata.keywords.is_empty());

        let again = sessions.end_conversation(&conversation.id).await.unwrap();
        assert_eq!(again, ended);
    }

    #[tokio::test]
    async fn test_send_to_superseded_conversation_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), replying("welcome back"));

        let first = sessions.start_conversation(Some("A")).await.unwrap();
        let second = sessions.start_conversation(Some("B")).await.unwrap();
        let superseded = store.get_conversation(&first.id).await.unwrap();

        let err = sessions
            .send_message(&first.id, "hello again")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::ConversationEnded(ref id) if *id == first.id));
        assert!(store.messages(&first.id).await.unwrap().is_empty());
        assert_eq!(store.get_conversation(&first.id).await.unwrap(), superseded);

        let active: Vec<String> = store
            .list_conversations()
            .await
            .unwrap()
            .into_iter()
            .filter(Conversation::is_active)
            .map(|c| c.id)
            .collect();
        assert_eq!(active, vec![second.id]);
    }

    #[tokio::test]
    async fn test_recovered_conversation_ends_other_active() {
        let store = Arc::new(MemoryStore::new());
        let mut failed = Conversation::new(Some("failed".into()));
        failed.fail("Local AI model returned an error.");
        store.insert_conversation(failed.clone()).await.unwrap();

        let sessions = sessions(store.clone(), replying("back online"));
        let current = sessions.start_conversation(Some("current")).await.unwrap();
        sessions.send_message(&failed.id, "retry").await.unwrap();

        let failed = store.get_conversation(&failed.id).await.unwrap();
        assert_eq!(failed.status, ConversationStatus::Active);
        let current = store.get_conversation(&current.id).await.unwrap();
        assert_eq!(current.status, ConversationStatus::Ended);
        assert!(current.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_summary_is_left_unset() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(
            store.clone(),
            Fixed(Err(|| CompletionError::Status {
                status: 500,
                message: "boom".into(),
            })),
        );
        let conversation = sessions.start_conversation(None).await.unwrap();
        sessions.send_message(&conversation.id, "Hi").await.unwrap();

        let ended = sessions.end_conversation(&conversation.id).await.unwrap();
        assert_eq!(ended.status, ConversationStatus::Ended);
        assert_eq!(ended.ai_summary, None);
        assert_eq!(ended.metadata.sentiment, None);
        assert_eq!(store.get_conversation(&conversation.id).await.unwrap(), ended);

        let hits = sessions
            .search("Local AI model returned an error.", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_idle_sweep_ends_only_stale_conversations() {
        let store = Arc::new(MemoryStore::new());
        let sessions = sessions(store.clone(), replying("ok"));

        let stale = Conversation::new(Some("stale".into()));
        store.insert_conversation(stale.clone()).await.unwrap();
        store
            .append_message(
                Message::user(&stale.id, "old").at(Utc::now() - Duration::minutes(30)),
            )
            .await
            .unwrap();

        let fresh = Conversation::new(Some("fresh".into()));
        store.insert_conversation(fresh.clone()).await.unwrap();
        store
            .append_message(Message::user(&fresh.id, "new"))
            .await
            .unwrap();

        let ended = sessions
            .end_idle_conversations(DEFAULT_IDLE_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(ended, 1);

        let stale = store.get_conversation(&stale.id).await.unwrap();
        assert_eq!(stale.status, ConversationStatus::Ended);
        assert_eq!(stale.metadata.ended_reason.as_deref(), Some("idle_timeout"));
        assert_eq!(stale.ai_summary, None);
        assert!(store.get_conversation(&fresh.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let mut short = Conversation::new(Some("short".into()));
        short.started_at = now - Duration::minutes(10);
        short.ended_at = Some(now - Duration::minutes(9));
        short.status = ConversationStatus::Ended;
        store.insert_conversation(short).await.unwrap();

        let mut long = Conversation::new(Some("long".into()));
        long.started_at = now - Duration::minutes(8);
        long.ended_at = Some(now - Duration::seconds(160));
        long.status = ConversationStatus::Ended;
        store.insert_conversation(long).await.unwrap();

        let mut active = Conversation::new(Some("active".into()));
        active.started_at = now;
        store.insert_conversation(active).await.unwrap();

        let sessions = sessions(store, replying("ok"));
        let stats = sessions.dashboard_stats().await.unwrap();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.ended, 2);
        assert_eq!(stats.error, 0);
        // (1 min + 5 min 20 s) / 2
        assert_eq!(stats.avg_duration_mins, 3.17);
        let recent: Vec<String> = stats.recent.iter().map(Conversation::display_title).collect();
        assert_eq!(recent, vec!["active", "long", "short"]);
    }

    #[tokio::test]
    async fn test_dashboard_stats_without_ended_conversations() {
        let sessions = sessions(Arc::new(MemoryStore::new()), replying("ok"));
        let stats = sessions.dashboard_stats().await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_duration_mins, 0.0);
    }

    #[test]
    fn test_system_status_reports_local_defaults() {
        let sessions = sessions(Arc::new(MemoryStore::new()), replying("ok"));
        assert_eq!(
            sessions.system_status(),
            SystemStatus {
                ai_mode: AiMode::Local,
                openai_enabled: false,
                local_url: parley_completion::DEFAULT_LOCAL_URL.to_string(),
                embedding_dimension: 8,
            }
        );
    }
}
