//! Context compression.
//!
//! The [`ContextCompressor`] shrinks a history that is approaching the model's
//! context limit. The system message and the most recent messages are kept
//! verbatim; older messages are summarized by a model when one is configured,
//! or dropped behind a short marker when not.
//!
//! Compression never loses the conversation: a failed summary returns
//! [`CompressionResult::Failed`] and the caller keeps its history.

use devin_llm::{Message, Role, SharedClient, StreamRequest};

use crate::conversation::state::{ConversationState, estimate_tokens};
use crate::error::AgentError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Prefix of the message that replaces compressed history.
pub const SUMMARY_PREFIX: &str = "[Conversation summary]";

/// Per-message cap when building the summarization transcript.
const MAX_TRANSCRIPT_MESSAGE_CHARS: usize = 2000;

const SUMMARY_PROMPT: &str = "\
Summarize the earlier portion of this conversation concisely. Focus on:
- The task being worked on and decisions made
- Files read or changed and commands run, with their outcomes
- Anything still pending

Provide a clear, factual summary in 1-2 paragraphs. The summary will replace \
the earlier messages while the most recent exchanges are preserved verbatim.";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// When and how much to compress.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    /// Compress automatically when over the threshold.
    pub enabled: bool,
    /// Fraction of `max_context_tokens` that triggers compression.
    pub threshold: f32,
    /// The model's context window.
    pub max_context_tokens: usize,
    /// Non-system messages kept verbatim.
    pub preserve_recent: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.7,
            max_context_tokens: 128_000,
            preserve_recent: 4,
        }
    }
}

/// Outcome category of [`ContextCompressor::try_compress_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionStatus {
    NotNeeded,
    Compressed,
    Failed,
}

/// Result of a compression attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionResult {
    /// Nothing to do; the history is unchanged.
    NotNeeded,
    /// The history was shortened.
    Compressed {
        messages: Vec<Message>,
        tokens_before: usize,
        tokens_after: usize,
    },
    /// Summarization failed; the history is unchanged.
    Failed { reason: String },
}

impl CompressionResult {
    pub fn status(&self) -> CompressionStatus {
        match self {
            Self::NotNeeded => CompressionStatus::NotNeeded,
            Self::Compressed { .. } => CompressionStatus::Compressed,
            Self::Failed { .. } => CompressionStatus::Failed,
        }
    }

    /// Estimated tokens saved, zero unless compressed.
    pub fn tokens_freed(&self) -> usize {
        match self {
            Self::Compressed {
                tokens_before,
                tokens_after,
                ..
            } => tokens_before.saturating_sub(*tokens_after),
            _ => 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ContextCompressor
// ─────────────────────────────────────────────────────────────────────────────

/// Decides when a history is too long and shortens it.
pub struct ContextCompressor {
    summarizer: Option<SharedClient>,
    config: CompressionConfig,
}

impl ContextCompressor {
    /// Create a compressor. Without a summarizer, old messages are pruned.
    pub fn new(summarizer: Option<SharedClient>, config: CompressionConfig) -> Self {
        Self { summarizer, config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    fn limit(&self) -> f32 {
        self.config.threshold * self.config.max_context_tokens as f32
    }

    /// Whether `state` is over the threshold.
    ///
    /// Uses the backend's reported input tokens when available, otherwise the
    /// character estimate.
    pub fn needs_compression(&self, state: &ConversationState) -> bool {
        if !self.config.enabled {
            return false;
        }
        let info = state.token_info();
        let tokens = if info.is_reported() {
            info.input_tokens as usize
        } else {
            state.estimated_tokens()
        };
        tokens as f32 > self.limit()
    }

    /// Compress `history` if it is over the threshold, or unconditionally with `force`.
    pub async fn try_compress_history(&self, history: &[Message], force: bool) -> CompressionResult {
        let tokens_before = estimate_messages(history);
        if !force && (!self.config.enabled || tokens_before as f32 <= self.limit()) {
            return CompressionResult::NotNeeded;
        }

        let (system, rest) = match history.first() {
            Some(first) if first.is_system() => (Some(first), &history[1..]),
            _ => (None, history),
        };
        if rest.len() <= self.config.preserve_recent {
            return CompressionResult::NotNeeded;
        }
        let (old, recent) = rest.split_at(rest.len() - self.config.preserve_recent);

        let replacement = match &self.summarizer {
            Some(client) => match summarize(client, old).await {
                Ok(summary) => format!("{}\n{}", SUMMARY_PREFIX, summary),
                Err(e) => {
                    tracing::warn!(error = %e, "History compression failed, keeping history");
                    return CompressionResult::Failed {
                        reason: e.to_string(),
                    };
                }
            },
            None => format!(
                "{}\n{} earlier messages were removed to fit the context window.",
                SUMMARY_PREFIX,
                old.len()
            ),
        };

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.extend(system.cloned());
        messages.push(Message::user(replacement));
        messages.extend_from_slice(recent);

        let tokens_after = estimate_messages(&messages);
        tracing::info!(
            compressed = old.len(),
            tokens_before,
            tokens_after,
            "Compressed conversation history"
        );
        CompressionResult::Compressed {
            messages,
            tokens_before,
            tokens_after,
        }
    }
}

fn estimate_messages(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

async fn summarize(client: &SharedClient, messages: &[Message]) -> Result<String, AgentError> {
    let transcript = messages
        .iter()
        .map(|m| {
            let label = match m.role {
                Role::System => "System",
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::Function => "Tool",
            };
            let content = if m.content.chars().count() > MAX_TRANSCRIPT_MESSAGE_CHARS {
                let head: String = m.content.chars().take(MAX_TRANSCRIPT_MESSAGE_CHARS).collect();
                format!("{}... [truncated]", head)
            } else {
                m.content.clone()
            };
            format!("{}: {}", label, content)
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let request = StreamRequest::new(format!(
        "Please summarize this conversation:\n\n{}",
        transcript
    ))
    .with_system_prompt(SUMMARY_PROMPT);

    let summary = client.stream(request).await?.collect_text().await?;
    let summary = summary.trim();
    if summary.is_empty() {
        return Err(AgentError::CompressionFailure("summarizer returned no text".into()));
    }
    Ok(summary.to_string())
}
