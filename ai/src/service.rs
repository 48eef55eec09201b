//! Provider orchestration.
//!
//! [`AiService`] composes a [`CompletionChain`] and an [`EmbeddingChain`]
//! over a [`ConversationStore`] and exposes contextual chat, conversation
//! summarization and semantic search. It is immutable after construction
//! and meant to be shared behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use parley_completion::{
    ChatMessage, CompletionChain, CompletionOutcome, DEFAULT_LOCAL_URL, FailureReply,
    LocalChatProvider, OpenAIChatProvider, SYSTEM_INSTRUCTION,
};
use parley_conversations::{Conversation, ConversationStore, Message, Sender};
use parley_embeddings::{
    Embedding, EmbeddingCache, EmbeddingChain, LocalProvider, OpenAIProvider, find_top_k,
};

use crate::config::{AiConfig, AiMode};
use crate::error::Result;

/// Number of hits returned by a search when the caller does not choose.
pub const DEFAULT_TOP_K: usize = 5;

/// Instruction placed before the transcript when summarizing.
pub const SUMMARY_INSTRUCTION: &str = "Summarize this conversation briefly. Then extract sentiment (positive/neutral/negative) and 3–5 keywords.";

/// Summary of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub summary: String,

    /// Always `neutral`; extraction is not performed.
    pub sentiment: String,

    /// Always empty; extraction is not performed.
    pub keywords: Vec<String>,

    /// Set when no provider produced the summary; `summary` then holds the
    /// failure sentinel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReply>,
}

impl ConversationSummary {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// A conversation matched by semantic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub conversation_id: String,

    /// Display title of the conversation.
    pub title: String,

    pub summary: String,

    /// Cosine similarity, rounded to three decimals.
    pub similarity: f32,
}

/// Orchestrates completion and embedding providers over a conversation store.
pub struct AiService {
    store: Arc<dyn ConversationStore>,
    completion: CompletionChain,
    embeddings: EmbeddingChain,
    mode: AiMode,
    local_url: String,
    search_concurrency: usize,
}

impl AiService {
    /// Assemble a service from prebuilt chains.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        completion: CompletionChain,
        embeddings: EmbeddingChain,
    ) -> Self {
        Self {
            store,
            completion,
            embeddings,
            mode: AiMode::Local,
            local_url: DEFAULT_LOCAL_URL.to_string(),
            search_concurrency: 1,
        }
    }

    /// Build the remote and local tiers described by `config`.
    pub fn from_config(config: &AiConfig, store: Arc<dyn ConversationStore>) -> Result<Self> {
        config.validate()?;
        let api_key = config.openai_api_key.clone().unwrap_or_default();

        let completion = CompletionChain::new()
            .with_tier(
                OpenAIChatProvider::new()
                    .with_api_key(api_key.clone())
                    .with_base_url(config.openai_base_url.clone())
                    .with_model(config.chat_model.clone())
                    .with_timeout(config.chat_timeout()),
            )
            .with_tier(
                LocalChatProvider::new(config.local_url.clone())
                    .with_model(config.local_chat_model.clone())
                    .with_temperature(config.temperature)
                    .with_timeout(config.chat_timeout()),
            );

        let mut embeddings = EmbeddingChain::new(config.embedding_dimension)
            .with_tier(
                OpenAIProvider::new()
                    .with_api_key(api_key)
                    .with_base_url(config.openai_base_url.clone())
                    .with_model(config.embedding_model.clone())
                    .with_timeout(config.embedding_timeout()),
            )
            .with_tier(
                LocalProvider::new(&config.local_url)
                    .with_model(config.local_embedding_model.clone())
                    .with_timeout(config.embedding_timeout()),
            );
        if config.cache_enabled {
            embeddings = embeddings.with_cache(EmbeddingCache::new(config.cache_max_entries));
        }

        info!(
            mode = %config.mode(),
            local_url = %config.local_url,
            dimension = config.embedding_dimension,
            "AI service configured"
        );

        Ok(Self::new(store, completion, embeddings)
            .with_mode(config.mode())
            .with_local_url(config.local_url.clone())
            .with_search_concurrency(config.search_concurrency))
    }

    /// Set the mode label reported to callers.
    pub fn with_mode(mut self, mode: AiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the local server URL reported to callers.
    pub fn with_local_url(mut self, url: impl Into<String>) -> Self {
        self.local_url = url.into();
        self
    }

    /// Set how many summaries are embedded at once during search.
    pub fn with_search_concurrency(mut self, concurrency: usize) -> Self {
        self.search_concurrency = concurrency.max(1);
        self
    }

    pub fn mode(&self) -> AiMode {
        self.mode
    }

    /// Whether the remote provider is configured.
    pub fn remote_enabled(&self) -> bool {
        self.mode == AiMode::OpenAI
    }

    pub fn local_url(&self) -> &str {
        &self.local_url
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn completion(&self) -> &CompletionChain {
        &self.completion
    }

    pub fn embeddings(&self) -> &EmbeddingChain {
        &self.embeddings
    }

    /// Build the prompt for a contextual chat turn.
    ///
    /// The system instruction comes first, then `history` in the given
    /// order, then `user_text`.
    pub fn build_chat_messages(history: &[Message], user_text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_INSTRUCTION));
        messages.extend(history.iter().map(|message| match message.sender {
            Sender::User => ChatMessage::user(message.content.clone()),
            Sender::Ai => ChatMessage::assistant(message.content.clone()),
        }));
        messages.push(ChatMessage::user(user_text));
        messages
    }

    /// Reply to `user_text` given the conversation's history. Does not persist.
    pub async fn chat_with_context(
        &self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<String> {
        Ok(self
            .chat_with_context_detailed(conversation, user_text)
            .await?
            .reply)
    }

    /// Like [`AiService::chat_with_context`], also reporting which tier
    /// answered or which failure sentinel was produced.
    pub async fn chat_with_context_detailed(
        &self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<CompletionOutcome> {
        let history = self.store.messages(&conversation.id).await?;
        debug!(
            conversation_id = %conversation.id,
            history = history.len(),
            "Building chat prompt"
        );
        let messages = Self::build_chat_messages(&history, user_text);
        Ok(self.completion.complete_detailed(&messages).await)
    }

    /// Summarize a conversation's transcript.
    pub async fn summarize_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<ConversationSummary> {
        let transcript = self
            .store
            .messages(&conversation.id)
            .await?
            .iter()
            .map(|m| format!("{}: {}", m.sender.as_str(), m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!("{SUMMARY_INSTRUCTION}\n\n{transcript}");
        let outcome = self
            .completion
            .complete_detailed(&[ChatMessage::user(prompt)])
            .await;

        Ok(ConversationSummary {
            summary: outcome.reply,
            sentiment: "neutral".to_string(),
            keywords: Vec::new(),
            failure: outcome.failure,
        })
    }

    /// Rank summarized conversations by similarity to `query`.
    ///
    /// Conversations without a summary are skipped. Equal scores keep store
    /// order.
    pub async fn semantic_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embeddings.embed(query).await;

        let summarized: Vec<Conversation> = self
            .store
            .list_conversations()
            .await?
            .into_iter()
            .filter(|c| c.summary().is_some())
            .collect();

        let candidates: Vec<(String, Embedding)> = stream::iter(&summarized)
            .map(|conversation| async move {
                let summary = conversation.summary().unwrap_or_default();
                (
                    conversation.id.clone(),
                    self.embeddings.embed(summary).await,
                )
            })
            .buffered(self.search_concurrency)
            .collect()
            .await;

        let by_id: HashMap<&str, &Conversation> =
            summarized.iter().map(|c| (c.id.as_str(), c)).collect();

        let hits: Vec<SearchHit> = find_top_k(&query_embedding, &candidates, top_k)
            .into_iter()
            .filter_map(|result| {
                let conversation = by_id.get(result.id.as_str())?;
                Some(SearchHit {
                    conversation_id: conversation.id.clone(),
                    title: conversation.display_title(),
                    summary: conversation.summary().unwrap_or_default().to_string(),
                    similarity: result.score,
                })
            })
            .collect();

        debug!(
            candidates = candidates.len(),
            hits = hits.len(),
            "Semantic search complete"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use parley_completion::{ChatRole, CompletionProvider};
    use parley_conversations::MemoryStore;
    use parley_embeddings::EmbeddingProvider;
    use pretty_assertions::assert_eq;

    use super::*;

    /// Records every prompt and answers with a fixed reply.
    struct Recorder {
        reply: &'static str,
        prompts: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
    }

    #[async_trait]
    impl CompletionProvider for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn complete(&self, messages: &[ChatMessage]) -> parley_completion::Result<String> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.to_string())
        }
    }

    /// Embeds known strings to fixed vectors.
    struct Lookup(Vec<(&'static str, Vec<f32>)>);

    #[async_trait]
    impl EmbeddingProvider for Lookup {
        fn name(&self) -> &str {
            "lookup"
        }

        fn model(&self) -> &str {
            "lookup"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn embed(&self, text: &str) -> parley_embeddings::Result<Embedding> {
            self.0
                .iter()
                .find(|(known, _)| *known == text)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| parley_embeddings::EmbeddingError::InvalidResponse(text.into()))
        }
    }

    fn service_with(
        store: Arc<MemoryStore>,
        reply: &'static str,
        vectors: Vec<(&'static str, Vec<f32>)>,
    ) -> (AiService, Arc<Mutex<Vec<Vec<ChatMessage>>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let completion = CompletionChain::new().with_tier(Recorder {
            reply,
            prompts: prompts.clone(),
        });
        let embeddings = EmbeddingChain::new(3).with_tier(Lookup(vectors));
        let service = AiService::new(store, completion, embeddings).with_search_concurrency(2);
        (service, prompts)
    }

    async fn summarized(store: &MemoryStore, title: &str, summary: Option<&str>) -> String {
        let mut conversation = Conversation::new(Some(title.to_string()));
        conversation.ai_summary = summary.map(str::to_string);
        let id = conversation.id.clone();
        store.insert_conversation(conversation).await.unwrap();
        id
    }

    #[test]
    fn test_build_chat_messages_order_and_roles() {
        let base = Utc::now();
        let history = vec![
            Message::user("c", "Hi").at(base),
            Message::ai("c", "Hello! How can I help?").at(base + Duration::seconds(1)),
        ];

        let messages = AiService::build_chat_messages(&history, "Tell me a joke");
        assert_eq!(
            messages,
            vec![
                ChatMessage::system("You are a helpful, concise AI assistant."),
                ChatMessage::user("Hi"),
                ChatMessage::assistant("Hello! How can I help?"),
                ChatMessage::user("Tell me a joke"),
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_with_context_uses_stored_history_in_creation_order() {
        let store = Arc::new(MemoryStore::new());
        let conversation = Conversation::new(None);
        let id = conversation.id.clone();
        store.insert_conversation(conversation.clone()).await.unwrap();

        let base = Utc::now();
        store
            .append_message(Message::ai(&id, "second").at(base + Duration::seconds(2)))
            .await
            .unwrap();
        store
            .append_message(Message::user(&id, "first").at(base))
            .await
            .unwrap();

        let (service, prompts) = service_with(store, "reply", Vec::new());
        let reply = service
            .chat_with_context(&conversation, "third")
            .await
            .unwrap();
        assert_eq!(reply, "reply");

        let prompts = prompts.lock().unwrap();
        let contents: Vec<&str> = prompts[0].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![SYSTEM_INSTRUCTION, "first", "second", "third"]
        );
        assert_eq!(prompts[0][0].role, ChatRole::System);
        assert_eq!(prompts[0][3].role, ChatRole::User);
    }

    #[tokio::test]
    async fn test_chat_does_not_persist() {
        let store = Arc::new(MemoryStore::new());
        let conversation = Conversation::new(None);
        store.insert_conversation(conversation.clone()).await.unwrap();

        let (service, _) = service_with(store.clone(), "reply", Vec::new());
        service.chat_with_context(&conversation, "hello").await.unwrap();

        assert!(store.messages(&conversation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_sends_single_transcript_prompt() {
        let store = Arc::new(MemoryStore::new());
        let conversation = Conversation::new(None);
        let id = conversation.id.clone();
        store.insert_conversation(conversation.clone()).await.unwrap();
        let base = Utc::now();
        store
            .append_message(Message::user(&id, "What is Rust?").at(base))
            .await
            .unwrap();
        store
            .append_message(
                Message::ai(&id, "A systems language.").at(base + Duration::seconds(1)),
            )
            .await
            .unwrap();

        let (service, prompts) = service_with(store, "User asked about Rust.", Vec::new());
        let summary = service.summarize_conversation(&conversation).await.unwrap();

        assert_eq!(
            summary,
            ConversationSummary {
                summary: "User asked about Rust.".to_string(),
                sentiment: "neutral".to_string(),
                keywords: Vec::new(),
                failure: None,
            }
        );
        let prompts = prompts.lock().unwrap();
        assert_eq!(
            prompts[0],
            vec![ChatMessage::user(format!(
                "{SUMMARY_INSTRUCTION}\n\nuser: What is Rust?\nai: A systems language."
            ))]
        );
    }

    #[tokio::test]
    async fn test_semantic_search_ranks_best_match_first() {
        let store = Arc::new(MemoryStore::new());
        summarized(&store, "A", Some("about gardening")).await;
        let b = summarized(&store, "B", Some("about rust lifetimes")).await;
        summarized(&store, "C", Some("about cooking")).await;

        let (service, _) = service_with(
            store,
            "",
            vec![
                ("rust borrow checker", vec![1.0, 0.0, 0.0]),
                ("about gardening", vec![0.0, 1.0, 0.0]),
                ("about rust lifetimes", vec![0.9, 0.1, 0.0]),
                ("about cooking", vec![0.5, 0.5, 0.5]),
            ],
        );

        let hits = service
            .semantic_search("rust borrow checker", 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].conversation_id, b);
        assert_eq!(hits[0].title, "B");
        assert_eq!(hits[0].similarity, 0.994);
        assert_eq!(hits[1].title, "C");
        assert_eq!(hits[1].similarity, 0.577);
    }

    #[tokio::test]
    async fn test_semantic_search_skips_unsummarized() {
        let store = Arc::new(MemoryStore::new());
        summarized(&store, "with summary", Some("about rust")).await;
        summarized(&store, "blank summary", Some("   ")).await;
        summarized(&store, "no summary", None).await;

        let (service, _) = service_with(
            store,
            "",
            vec![("rust", vec![1.0, 0.0, 0.0]), ("about rust", vec![1.0, 0.0, 0.0])],
        );

        let hits = service.semantic_search("rust", 10).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["with summary"]);
    }

    #[tokio::test]
    async fn test_semantic_search_ties_keep_store_order() {
        let store = Arc::new(MemoryStore::new());
        for title in ["one", "two", "three"] {
            summarized(&store, title, Some("same summary")).await;
        }
        let (service, _) = service_with(
            store,
            "",
            vec![("q", vec![1.0, 0.0, 0.0]), ("same summary", vec![1.0, 0.0, 0.0])],
        );

        let hits = service.semantic_search("q", DEFAULT_TOP_K).await.unwrap();
        let titles: Vec<&str> = hits.iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["one", "two", "three"]);
    }
}
