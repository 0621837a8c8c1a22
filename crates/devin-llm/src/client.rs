//! The LLM client contract and a scripted mock implementation.
//!
//! The conversation engine only needs four things from a model backend:
//! stream a reply, append a local message, clear local messages, and a name
//! for logs. Anything satisfying [`LlmClient`] is interchangeable.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result, is_retryable};
use crate::stream::ResponseStream;
use crate::types::{Message, Role, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    client_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !is_retryable(&e) || attempt >= max_retries => return Err(e),
            Err(e) => {
                let wait = e.retry_after().unwrap_or(backoff);
                attempt += 1;
                tracing::warn!(
                    client = client_name,
                    attempt = attempt,
                    max_retries = max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Contract
// ─────────────────────────────────────────────────────────────────────────────

/// One streaming request.
///
/// `history` excludes `user_text`; clients append it themselves according to
/// their own prompt layout.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    /// The message being sent.
    pub user_text: String,
    /// System prompt, if the conversation has one.
    pub system_prompt: Option<String>,
    /// Prior conversation, excluding the system message and `user_text`.
    pub history: Vec<Message>,
    /// Whether the client should remember this exchange locally.
    pub keep_history: bool,
    /// Route this request to the planning model, if the backend has one.
    pub use_plan_model: bool,
}

impl StreamRequest {
    /// Create a request for a single prompt with no history.
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            ..Default::default()
        }
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the prior conversation.
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    /// Ask the client to keep the exchange in its local messages.
    pub fn keep_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }

    /// Request the planning model.
    pub fn use_plan_model(mut self, plan: bool) -> Self {
        self.use_plan_model = plan;
        self
    }
}

/// Contract the engine consumes from any model backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Stream a reply to `request`.
    ///
    /// The returned stream is single-consumer and cancellable; clients that
    /// own a transport register its teardown on the stream's cancel handle.
    async fn stream(&self, request: StreamRequest) -> Result<ResponseStream>;

    /// Append a message to the client's local message buffer.
    fn append_local_message(&self, text: &str, role: Role);

    /// Drop the client's local message buffer.
    fn clear_messages(&self);

    /// Token usage the backend reported for the latest request, if any.
    ///
    /// Each report is returned once.
    fn take_usage(&self) -> Option<Usage> {
        None
    }
}

/// A client that can be shared across tasks.
pub type SharedClient = Arc<dyn LlmClient>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Client
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted reply for [`MockClient`].
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these chunks, then end.
    Chunks(Vec<String>),
    /// Stream these chunks, then wait forever (for cancellation tests).
    Hang(Vec<String>),
    /// Fail the `stream` call with a network error.
    Error(String),
}

/// A mock client for testing.
///
/// Returns pre-configured replies in order and records every request and
/// local message so tests can assert on what the engine sent.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct MockClient {
    replies: std::sync::Mutex<std::collections::VecDeque<MockReply>>,
    request_log: std::sync::Mutex<Vec<StreamRequest>>,
    local_messages: std::sync::Mutex<Vec<Message>>,
    cancellations: Arc<std::sync::atomic::AtomicUsize>,
    usage: std::sync::Mutex<Option<Usage>>,
}

#[cfg(any(test, feature = "testing"))]
impl MockClient {
    /// Create a mock with the given replies.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: std::sync::Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    /// Create a mock that answers each request with one whole-text reply.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|t| MockReply::Chunks(vec![t.into()]))
                .collect(),
        )
    }

    /// Create a mock with a single text reply.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::with_texts([text.into()])
    }

    /// Report this usage once, after the next request.
    pub fn set_usage(&self, input_tokens: u32, output_tokens: u32) {
        *self.usage.lock().unwrap() = Some(Usage {
            input_tokens,
            output_tokens,
        });
    }

    /// Queue another reply.
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Get all requests that were made to this client.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }

    /// Messages appended through `append_local_message`.
    pub fn local_messages(&self) -> Vec<Message> {
        self.local_messages.lock().unwrap().clone()
    }

    /// Number of times a stream's cancel callback ran.
    pub fn cancellations(&self) -> usize {
        self.cancellations
            .load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl LlmClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, request: StreamRequest) -> Result<ResponseStream> {
        self.request_log.lock().unwrap().push(request);

        let reply = self.replies.lock().unwrap().pop_front();
        let stream = match reply {
            None => {
                return Err(LlmError::backend(
                    "MockClient: no more replies available",
                ));
            }
            Some(MockReply::Error(message)) => return Err(LlmError::transport(message)),
            Some(MockReply::Chunks(chunks)) => ResponseStream::from_chunks(chunks),
            Some(MockReply::Hang(chunks)) => {
                let items: Vec<Result<String>> = chunks.into_iter().map(Ok).collect();
                ResponseStream::new(Box::pin(
                    futures::StreamExt::chain(
                        futures::stream::iter(items),
                        futures::stream::pending(),
                    ),
                ))
            }
        };

        let counter = self.cancellations.clone();
        stream.cancel_handle().on_cancel(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        Ok(stream)
    }

    fn append_local_message(&self, text: &str, role: Role) {
        self.local_messages
            .lock()
            .unwrap()
            .push(Message::new(role, text));
    }

    fn clear_messages(&self) {
        self.local_messages.lock().unwrap().clear();
    }

    fn take_usage(&self) -> Option<Usage> {
        self.usage.lock().unwrap().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_mock_client_replies_in_order() {
        let client = MockClient::with_texts(["first", "second"]);

        let one = client.stream(StreamRequest::new("a")).await.unwrap();
        assert_eq!(one.collect_text().await.unwrap(), "first");

        let two = client.stream(StreamRequest::new("b")).await.unwrap();
        assert_eq!(two.collect_text().await.unwrap(), "second");

        assert_eq!(client.request_count(), 2);
        assert_eq!(client.requests()[1].user_text, "b");
    }

    #[tokio::test]
    async fn test_mock_client_exhausted() {
        let client = MockClient::new(vec![]);
        let err = client.stream(StreamRequest::new("hi")).await.unwrap_err();
        assert!(matches!(err, LlmError::Backend(_)));
    }

    #[tokio::test]
    async fn test_mock_client_error_reply() {
        let client = MockClient::new(vec![MockReply::Error("refused".to_string())]);
        let err = client.stream(StreamRequest::new("hi")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_mock_client_cancel_runs_callback() {
        let client = MockClient::new(vec![MockReply::Hang(vec!["partial".to_string()])]);
        let mut stream = client.stream(StreamRequest::new("hi")).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");

        stream.cancel();
        stream.cancel();
        assert!(stream.next().await.is_none());
        assert_eq!(client.cancellations(), 1);
    }

    #[test]
    fn test_mock_client_local_messages() {
        let client = MockClient::default();
        client.append_local_message("hello", Role::User);
        client.append_local_message("hi there", Role::Assistant);
        assert_eq!(client.local_messages().len(), 2);

        client.clear_messages();
        assert!(client.local_messages().is_empty());
    }

    #[test]
    fn test_stream_request_builder() {
        let request = StreamRequest::new("q")
            .with_system_prompt("sys")
            .with_history(vec![Message::user("earlier")])
            .keep_history(true)
            .use_plan_model(true);
        assert_eq!(request.system_prompt.as_deref(), Some("sys"));
        assert_eq!(request.history.len(), 1);
        assert!(request.keep_history);
        assert!(request.use_plan_model);
    }

    #[tokio::test]
    async fn test_with_retry_recovers_from_transient_errors() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(3, Duration::from_millis(1), "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::transport("flaky"))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_gives_up_on_fatal_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(3, Duration::from_millis(1), "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Auth("bad token".to_string())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_exhausts_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, Duration::from_millis(1), "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::transport("down")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
