//! Conversation management.
//!
//! A [`ConversationManager`] owns one conversation's history and drives a
//! single model request per user turn:
//!
//! ```text
//! Idle → Appended → (MaybeCompress) → Dispatched → Streaming → Idle
//! ```
//!
//! Tool output re-enters the conversation as a user message; the model has
//! no separate tool-result channel.

pub mod state;

use devin_llm::{Message, ResponseStream, SharedClient, StreamRequest};

use crate::compression::{CompressionConfig, CompressionResult, ContextCompressor};
use crate::error::Result;
pub use state::{ConversationState, estimate_tokens};

/// Owns the history of one conversation.
///
/// Mutating operations take `&mut self`; share a manager between tasks by
/// wrapping it in a lock.
pub struct ConversationManager {
    client: SharedClient,
    state: ConversationState,
    compressor: ContextCompressor,
    plan_capable: bool,
    keep_history: bool,
    last_compression: Option<CompressionResult>,
}

impl ConversationManager {
    /// Create a manager. `client` also summarizes history when compressing.
    pub fn new(
        client: SharedClient,
        system_prompt: impl Into<String>,
        compression: CompressionConfig,
        plan_capable: bool,
    ) -> Self {
        Self {
            compressor: ContextCompressor::new(Some(client.clone()), compression),
            client,
            state: ConversationState::new(system_prompt),
            plan_capable,
            keep_history: true,
            last_compression: None,
        }
    }

    /// Use a different compressor, e.g. one that prunes instead of summarizing.
    pub fn with_compressor(mut self, compressor: ContextCompressor) -> Self {
        self.compressor = compressor;
        self
    }

    /// Whether the client should keep exchanges in its own local messages.
    pub fn with_keep_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }

    /// Append `text` as a user message and stream the model's reply.
    ///
    /// History is compressed first when it is over the threshold. Cancelling
    /// the returned stream leaves the user message in place.
    pub async fn send_message(&mut self, text: &str) -> Result<ResponseStream> {
        let use_plan_model = self.should_use_plan_model();
        self.state.append(Message::user(text));

        if self.compressor.needs_compression(&self.state) {
            self.compress(false).await;
        }

        let others = self.state.non_system();
        let history = others[..others.len().saturating_sub(1)].to_vec();
        let mut request = StreamRequest::new(text)
            .with_history(history)
            .keep_history(self.keep_history)
            .use_plan_model(use_plan_model);
        if let Some(prompt) = self.state.system_prompt() {
            request = request.with_system_prompt(prompt);
        }

        tracing::debug!(
            client = %self.client.name(),
            messages = self.state.len(),
            plan = use_plan_model,
            "Sending message"
        );
        Ok(self.client.stream(request).await?)
    }

    /// Record the model's completed reply, along with any token usage the
    /// client reported for it.
    pub fn add_assistant_response(&mut self, text: impl Into<String>) {
        self.state.append(Message::assistant(text));
        if let Some(usage) = self.client.take_usage() {
            self.record_usage(usage.input_tokens, usage.output_tokens);
        }
    }

    /// Record backend-reported token usage for the latest request.
    ///
    /// Once reported, input tokens replace the character estimate when
    /// deciding whether to compress.
    pub fn record_usage(&mut self, input_tokens: u32, output_tokens: u32) {
        tracing::debug!(input_tokens, output_tokens, "Recording token usage");
        self.state.record_usage(input_tokens, output_tokens);
    }

    /// Record formatted tool output.
    pub fn add_tool_results(&mut self, formatted: impl Into<String>) {
        self.state.append(Message::user(formatted));
    }

    /// Drop all history except the system prompt, here and in the client.
    pub fn reset(&mut self) {
        self.state.clear();
        self.client.clear_messages();
    }

    /// Compress now regardless of size. Clears the history if compression fails.
    pub async fn force_compress(&mut self) -> CompressionResult {
        let result = self.compress(true).await;
        if let CompressionResult::Failed { reason } = &result {
            tracing::warn!(reason = %reason, "Forced compression failed, clearing history");
            self.state.clear();
        }
        result
    }

    async fn compress(&mut self, force: bool) -> CompressionResult {
        // Reported usage already crossed the threshold when called unforced.
        let force = force || self.state.token_info().is_reported();
        let result = self
            .compressor
            .try_compress_history(self.state.history(), force)
            .await;
        if let CompressionResult::Compressed { messages, .. } = &result {
            self.state.replace_history(messages.clone());
            self.last_compression = Some(result.clone());
        }
        result
    }

    /// The most recent successful compression, if not yet taken.
    pub fn take_last_compression(&mut self) -> Option<CompressionResult> {
        self.last_compression.take()
    }

    /// Whether the next request should go to the planning model.
    ///
    /// True only for the second user turn: a system prompt plus exactly one
    /// user and one assistant message, and no tool messages.
    pub fn should_use_plan_model(&self) -> bool {
        self.plan_capable
            && self.state.system_message().is_some()
            && self.state.user_turns() == 1
            && self.state.assistant_turns() == 1
            && self.state.function_turns() == 0
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn history(&self) -> &[Message] {
        self.state.history()
    }

    pub fn replace_system_prompt(&mut self, text: impl Into<String>) {
        self.state.replace_system_prompt(text);
    }

    pub fn client(&self) -> &SharedClient {
        &self.client
    }
}
