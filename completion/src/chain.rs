//! Tiered chat completion.
//!
//! Each call tries the configured providers in order, one attempt per tier,
//! and stops at the first reply. When the last attempted tier fails, its
//! error picks one of the [`FailureReply`] sentinels, so
//! [`CompletionChain::complete`] always yields displayable text.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::CompletionError;
use crate::message::ChatMessage;
use crate::provider::CompletionProvider;

/// User-visible replies returned when every tier has failed.
///
/// Operators can treat these strings as sentinels when monitoring stored AI
/// turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReply {
    /// The last provider answered with a non-200 status.
    ProviderError,
    /// The last provider answered without a reply field.
    InvalidResponse,
    /// The last provider could not be reached.
    Unavailable,
}

impl FailureReply {
    pub const ALL: [FailureReply; 3] = [
        FailureReply::ProviderError,
        FailureReply::InvalidResponse,
        FailureReply::Unavailable,
    ];

    /// The literal text stored as the AI turn.
    pub const fn message(self) -> &'static str {
        match self {
            Self::ProviderError => "Local AI model returned an error.",
            Self::InvalidResponse => "Local AI model did not return a valid response.",
            Self::Unavailable => "AI service is temporarily unavailable. Please try again later.",
        }
    }

    /// Recognize a sentinel in stored reply text.
    pub fn from_reply(reply: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.message() == reply)
    }
}

impl fmt::Display for FailureReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of one pass through the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    /// Reply text, or the failure sentinel text.
    pub reply: String,

    /// Name of the provider that answered.
    pub provider: Option<String>,

    /// Set when every tier failed.
    pub failure: Option<FailureReply>,
}

impl CompletionOutcome {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Ordered list of completion providers.
#[derive(Default)]
pub struct CompletionChain {
    tiers: Vec<Arc<dyn CompletionProvider>>,
}

impl CompletionChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider as the next tier.
    pub fn with_tier(self, provider: impl CompletionProvider + 'static) -> Self {
        self.with_shared_tier(Arc::new(provider))
    }

    /// Append a shared provider as the next tier.
    pub fn with_shared_tier(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.tiers.push(provider);
        self
    }

    /// Resolve a reply. Never fails.
    pub async fn complete(&self, messages: &[ChatMessage]) -> String {
        self.complete_detailed(messages).await.reply
    }

    /// Resolve a reply and report which tier answered.
    pub async fn complete_detailed(&self, messages: &[ChatMessage]) -> CompletionOutcome {
        let mut last_error: Option<CompletionError> = None;

        for tier in &self.tiers {
            if !tier.is_available() {
                debug!("Skipping unavailable completion provider: {}", tier.name());
                continue;
            }

            match tier.complete(messages).await {
                Ok(reply) => {
                    info!(provider = tier.name(), "Completion succeeded");
                    return CompletionOutcome {
                        reply,
                        provider: Some(tier.name().to_string()),
                        failure: None,
                    };
                }
                Err(err) => {
                    warn!(
                        provider = tier.name(),
                        "Completion request failed, falling back: {err}"
                    );
                    last_error = Some(err);
                }
            }
        }

        let failure = last_error
            .as_ref()
            .map_or(FailureReply::Unavailable, CompletionError::failure_reply);
        error!(?failure, "All completion providers failed");

        CompletionOutcome {
            reply: failure.message().to_string(),
            provider: None,
            failure: Some(failure),
        }
    }
}
