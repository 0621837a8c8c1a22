//! Custom HTTP agents.
//!
//! A custom agent is any HTTP endpoint described declaratively: where to post,
//! how to authenticate, how to shape the request body and where the reply
//! text lives in the response. [`CustomAgentClient`] turns that description
//! into an [`LlmClient`], so its output lands in the conversation exactly
//! like any other model reply.
//!
//! | action                         | transport                          |
//! |--------------------------------|------------------------------------|
//! | `Direct`, `WebView`, `DevIns`  | one JSON request, one reply string |
//! | `Stream`, `TextChunk`          | Server-Sent-Events                 |
//! | `Flow`                         | unsupported                        |

pub mod response_path;
pub mod sse;
pub mod template;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{LlmClient, StreamRequest, with_retry};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::stream::{CancelHandle, ResponseStream};
use crate::types::{Message, Role, Usage};

pub use response_path::{DEFAULT_JSON_PATH, DEFAULT_STREAM_PATH, ResponsePath};
pub use sse::{LocalMessages, UsageSlot, parse_failure_message, parse_sse_stream};
pub use template::{Substitution, substitute_content, substitute_with_strategy};

/// Default timeout for custom agent requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication scheme for a custom agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthType {
    /// `Authorization: Bearer <token>`.
    Bearer,
}

/// Credentials for a custom agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAuth {
    /// Scheme.
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    /// Secret token.
    pub token: String,
}

impl AgentAuth {
    /// Bearer credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            auth_type: AuthType::Bearer,
            token: token.into(),
        }
    }
}

/// How a custom agent's response is delivered and consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseAction {
    /// Single JSON response, shown directly.
    #[default]
    Direct,
    /// SSE stream of chunks.
    Stream,
    /// SSE stream rendered chunk by chunk.
    TextChunk,
    /// Single response rendered by the host as a web view.
    WebView,
    /// Single response containing DevIns tool blocks.
    DevIns,
    /// Multi-step flow. Not supported.
    Flow,
}

impl ResponseAction {
    /// Returns true if the agent replies with an SSE stream.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Stream | Self::TextChunk)
    }
}

/// Runtime configuration for one custom agent.
#[derive(Debug, Clone)]
pub struct CustomAgentConfig {
    /// Agent name, used in logs.
    pub name: String,
    /// Endpoint to POST to.
    pub url: String,
    /// Optional credentials.
    pub auth: Option<AgentAuth>,
    /// Request body template with a `$content` placeholder.
    pub request_format: Option<String>,
    /// JSONPath locating the reply text.
    pub response_format: Option<String>,
    /// Delivery mode.
    pub response_action: ResponseAction,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries for transient errors on non-streaming requests.
    pub max_retries: u32,
    /// Initial backoff between retries.
    pub retry_backoff: Duration,
}

impl CustomAgentConfig {
    /// Create a config with defaults for everything but the name and URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            auth: None,
            request_format: None,
            response_format: None,
            response_action: ResponseAction::Direct,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Set credentials.
    pub fn with_auth(mut self, auth: AgentAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set the request body template.
    pub fn with_request_format(mut self, template: impl Into<String>) -> Self {
        self.request_format = Some(template.into());
        self
    }

    /// Set the reply extraction path.
    pub fn with_response_format(mut self, path: impl Into<String>) -> Self {
        self.response_format = Some(path.into());
        self
    }

    /// Set the delivery mode.
    pub fn with_response_action(mut self, action: ResponseAction) -> Self {
        self.response_action = action;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Extraction path for this agent, falling back to the OpenAI shape.
    pub fn response_path(&self) -> Result<ResponsePath> {
        match self.response_format.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => ResponsePath::parse(path),
            _ if self.response_action.is_streaming() => ResponsePath::parse(DEFAULT_STREAM_PATH),
            _ => ResponsePath::parse(DEFAULT_JSON_PATH),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Body
// ─────────────────────────────────────────────────────────────────────────────

/// Build the request body for one prompt.
///
/// With a template, the prompt is substituted into it; when there is a system
/// prompt or prior history, the whole transcript is rendered into `$content`
/// (see [`render_transcript`]). Without a template, an OpenAI-style chat body
/// is built from the system prompt, `history` and the prompt.
pub fn build_request_body(
    config: &CustomAgentConfig,
    request: &StreamRequest,
    history: &[Message],
) -> Result<String> {
    if let Some(template) = config.request_format.as_deref()
        && !template.trim().is_empty()
    {
        let content = render_transcript(request, history);
        return substitute_content(template, &content).ok_or_else(|| {
            LlmError::config(format!(
                "request format for agent '{}' has no \"$content\" placeholder",
                config.name
            ))
        });
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    if let Some(system) = request.system_prompt.as_deref() {
        messages.push(serde_json::json!({"role": "system", "content": system}));
    }
    for message in history.iter().filter(|m| !m.is_system()) {
        messages.push(serde_json::json!({
            "role": message.role.as_str(),
            "content": message.content,
        }));
    }
    messages.push(serde_json::json!({"role": "user", "content": request.user_text}));

    let body = serde_json::json!({
        "messages": messages,
        "stream": config.response_action.is_streaming(),
    });
    Ok(body.to_string())
}

/// Flatten a request into the single prompt a templated agent receives.
///
/// A bare prompt is passed through unchanged. Otherwise the system prompt,
/// each prior turn and the prompt become labelled blocks separated by blank
/// lines (`System:`, `User:`, `Assistant:`, `Function:`).
pub fn render_transcript(request: &StreamRequest, history: &[Message]) -> String {
    let turns: Vec<&Message> = history.iter().filter(|m| !m.is_system()).collect();
    if request.system_prompt.is_none() && turns.is_empty() {
        return request.user_text.clone();
    }

    let mut blocks = Vec::with_capacity(turns.len() + 2);
    if let Some(system) = request.system_prompt.as_deref() {
        blocks.push(format!("System: {}", system));
    }
    for message in turns {
        blocks.push(format!("{}: {}", role_label(message.role), message.content));
    }
    blocks.push(format!("User: {}", request.user_text));
    blocks.join("\n\n")
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::System => "System",
        Role::User => "User",
        Role::Assistant => "Assistant",
        Role::Function => "Function",
    }
}

/// Extract the reply text from a whole JSON response body.
pub fn extract_json_response(body: &str, path: &ResponsePath) -> Result<String> {
    extract_json_reply(body, path).map(|(text, _)| text)
}

/// Like [`extract_json_response`], also returning any reported token usage.
fn extract_json_reply(body: &str, path: &ResponsePath) -> Result<(String, Option<Usage>)> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        LlmError::Serialization(format!("response is not JSON ({}): {}", e, body))
    })?;
    let text = path.extract_text(&value).ok_or_else(|| {
        LlmError::Serialization(format!(
            "Failed to parse response. Please check your response format: {}. Original response: {}",
            path, body
        ))
    })?;
    Ok((text, Usage::from_response(&value)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// [`LlmClient`] backed by a declaratively configured HTTP agent.
///
/// The client keeps its own local message list. It is owned by one session
/// and not shared across sessions.
pub struct CustomAgentClient {
    client: Client,
    config: CustomAgentConfig,
    path: ResponsePath,
    messages: LocalMessages,
    usage: UsageSlot,
}

impl CustomAgentClient {
    /// Create a client, validating the response format up front.
    pub fn new(config: CustomAgentConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(LlmError::config(format!(
                "custom agent '{}' has no url",
                config.name
            )));
        }

        let path = config.response_path()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            path,
            messages: Arc::new(Mutex::new(Vec::new())),
            usage: Arc::new(Mutex::new(None)),
        })
    }

    /// The agent's configuration.
    pub fn config(&self) -> &CustomAgentConfig {
        &self.config
    }

    /// Snapshot of the local message list.
    pub fn local_messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Send one prompt and materialize the whole reply.
    pub async fn execute(&self, prompt: &str) -> Result<String> {
        let request = StreamRequest::new(prompt).keep_history(true);
        self.stream(request).await?.collect_text().await
    }

    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        match &self.config.auth {
            Some(AgentAuth {
                auth_type: AuthType::Bearer,
                token,
            }) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn post(&self, body: String) -> Result<Response> {
        let response = self
            .add_headers(self.client.post(&self.config.url))
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }
        Ok(response)
    }

    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("HTTP {}: {}", status, body)),
            429 => LlmError::RateLimit(RateLimitInfo::from_header(
                format!("HTTP {}: {}", status, body),
                retry_after.as_deref(),
            )),
            _ => LlmError::Backend(format!("HTTP {}: {}", status, body)),
        }
    }

    async fn stream_sse(&self, body: String, keep_history: bool) -> Result<ResponseStream> {
        let response = self.post(body).await?;
        let history = keep_history.then(|| self.messages.clone());
        let mut chunks = parse_sse_stream(
            response.bytes_stream(),
            self.path.clone(),
            history,
            Some(self.usage.clone()),
        );

        // Pump the connection from a task so cancelling can abort it outright.
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let pump = tokio::spawn(async move {
            while let Some(chunk) = futures::StreamExt::next(&mut chunks).await {
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });

        let handle = CancelHandle::new();
        let agent = self.config.name.clone();
        let abort = pump.abort_handle();
        handle.on_cancel(move || {
            tracing::debug!(agent = %agent, "Aborting custom agent stream");
            abort.abort();
        });

        let received = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });
        Ok(ResponseStream::with_handle(Box::pin(received), handle))
    }

    async fn request_direct(&self, body: String, keep_history: bool) -> Result<ResponseStream> {
        let text = with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            &self.config.name,
            || {
                let body = body.clone();
                async move {
                    let response = self.post(body).await?;
                    Ok(response.text().await?)
                }
            },
        )
        .await?;

        let (reply, usage) = extract_json_reply(&text, &self.path)?;
        if let Some(usage) = usage {
            tracing::debug!(
                agent = %self.config.name,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Agent reported token usage"
            );
            *self.usage.lock() = Some(usage);
        }
        if keep_history && !reply.is_empty() {
            self.messages.lock().push(Message::assistant(reply.clone()));
        }
        Ok(ResponseStream::from_chunks([reply]))
    }
}

#[async_trait]
impl LlmClient for CustomAgentClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn stream(&self, request: StreamRequest) -> Result<ResponseStream> {
        if self.config.response_action == ResponseAction::Flow {
            return Err(LlmError::Unsupported(format!(
                "response action Flow is not supported (agent '{}')",
                self.config.name
            )));
        }

        let history = if request.history.is_empty() {
            self.local_messages()
        } else {
            request.history.clone()
        };
        let body = build_request_body(&self.config, &request, &history)?;

        tracing::debug!(
            agent = %self.config.name,
            action = ?self.config.response_action,
            body_len = body.len(),
            "Sending custom agent request"
        );

        if request.keep_history {
            self.messages.lock().push(Message::user(request.user_text.clone()));
        }
        *self.usage.lock() = None;

        if self.config.response_action.is_streaming() {
            self.stream_sse(body, request.keep_history).await
        } else {
            self.request_direct(body, request.keep_history).await
        }
    }

    fn append_local_message(&self, text: &str, role: Role) {
        self.messages.lock().push(Message::new(role, text));
    }

    fn clear_messages(&self) {
        self.messages.lock().clear();
    }

    fn take_usage(&self) -> Option<Usage> {
        self.usage.lock().take()
    }
}

impl std::fmt::Debug for CustomAgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomAgentClient")
            .field("name", &self.config.name)
            .field("url", &self.config.url)
            .field("action", &self.config.response_action)
            .finish()
    }
}
