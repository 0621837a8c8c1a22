//! The agent loop.
//!
//! [`AgentExecutor::run`] sends a task to the model, executes the tool calls
//! in each reply, feeds the formatted results back, and repeats until the
//! model stops calling tools or a limit is hit. Progress is reported as a
//! stream of [`AgentEvent`]s ending with [`AgentEvent::Done`].

use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::conversation::ConversationManager;
use crate::compression::CompressionResult;
use crate::formatter::ToolResultFormatter;
use crate::parser::{ToolCallParser, ToolInvocation};
use crate::tool::{
    ErrorKind, PendingSessions, ToolContext, ToolParams, ToolRegistry, ToolResult, value_to_text,
};

/// Continuation sent after each batch of tool results.
pub const CONTINUATION_MESSAGE: &str = "Please continue with the task based on the tool execution results above. \
Use additional tools if needed, or summarize if the task is complete.";

/// Result message for a call blocked by repeat detection.
pub const REPEATED_CALLS_MESSAGE: &str = "Stopped due to repeated tool calls";

/// Build the first message of a run.
pub fn initial_message(task: &str) -> String {
    format!(
        "Task: {}\n\nPlease analyze this task and use the available DevIns tools to complete it. \
         Use tools like /read-file, /write-file, /shell, etc. as needed.",
        task
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Executor limits.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Model requests allowed per run.
    pub max_iterations: u32,
    /// Directory tools resolve relative paths against.
    pub working_dir: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            working_dir: PathBuf::from("."),
        }
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model replied without tool calls.
    Completed,
    MaxIterations,
    /// The last five tool calls all failed.
    Stuck,
    /// The model backend failed.
    TransportError,
    Cancelled,
}

/// One executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStep {
    pub iteration: u32,
    pub tool_name: String,
    pub params: ToolParams,
    pub result: ToolResult,
}

impl AgentStep {
    pub fn success(&self) -> bool {
        self.result.is_success()
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutcome {
    pub success: bool,
    pub iterations: u32,
    /// The model's last reply.
    pub final_response: String,
    pub steps: Vec<AgentStep>,
    pub stop_reason: StopReason,
}

/// Progress of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A chunk of model output.
    Text { content: String },
    /// A tool call is about to run.
    ToolCall {
        tool_name: String,
        params: ToolParams,
    },
    /// A tool call finished.
    ToolResult {
        tool_name: String,
        result: ToolResult,
    },
    /// The history was compressed before a request.
    Compressed {
        tokens_before: usize,
        tokens_after: usize,
    },
    /// A non-fatal problem or the error that ended the run.
    Error { message: String },
    /// The run is over.
    Done { outcome: AgentOutcome },
}

/// A boxed stream of agent events.
pub type AgentStream = Pin<Box<dyn Stream<Item = AgentEvent> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Repeat Detection
// ─────────────────────────────────────────────────────────────────────────────

const SIGNATURE_HISTORY: usize = 10;
const REPEAT_WINDOW: usize = 3;

/// Blocks a model that keeps issuing the same call.
#[derive(Debug, Default)]
struct RepeatGuard {
    recent: VecDeque<String>,
}

impl RepeatGuard {
    fn signature(call: &ToolInvocation) -> String {
        let params = call
            .params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, value_to_text(v)))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}:{}", call.tool_name, params)
    }

    fn max_repeats(tool_name: &str) -> usize {
        match tool_name {
            "read-file" | "write-file" => 3,
            _ => 2,
        }
    }

    /// Record `call`. Returns the match count when it repeats too often.
    fn record(&mut self, call: &ToolInvocation) -> Option<usize> {
        let signature = Self::signature(call);
        self.recent.push_back(signature.clone());
        if self.recent.len() > SIGNATURE_HISTORY {
            self.recent.pop_front();
        }
        let matches = self
            .recent
            .iter()
            .rev()
            .take(REPEAT_WINDOW)
            .filter(|s| **s == signature)
            .count();
        (matches >= Self::max_repeats(&call.tool_name)).then_some(matches)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Executor
// ─────────────────────────────────────────────────────────────────────────────

/// Drives a conversation through tool-calling iterations.
pub struct AgentExecutor {
    manager: Arc<Mutex<ConversationManager>>,
    registry: Arc<ToolRegistry>,
    parser: ToolCallParser,
    config: ExecutorConfig,
    pending: PendingSessions,
    cancellation: CancellationToken,
}

impl AgentExecutor {
    pub fn new(
        manager: ConversationManager,
        registry: Arc<ToolRegistry>,
        parser: ToolCallParser,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            registry,
            parser,
            config,
            pending: PendingSessions::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Stop runs when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Background tool sessions started by this executor.
    pub fn pending(&self) -> &PendingSessions {
        &self.pending
    }

    /// The conversation, for inspection between runs.
    pub fn manager(&self) -> Arc<Mutex<ConversationManager>> {
        self.manager.clone()
    }

    /// Run `task`, streaming progress.
    ///
    /// The conversation is locked for the whole run.
    pub fn run(&self, task: &str) -> AgentStream {
        let manager = self.manager.clone();
        let registry = self.registry.clone();
        let parser = self.parser.clone();
        let config = self.config.clone();
        let cancellation = self.cancellation.clone();
        let ctx = ToolContext::new(config.working_dir.clone())
            .with_cancellation(cancellation.child_token())
            .with_pending(self.pending.clone());
        let first_message = initial_message(task);

        Box::pin(async_stream::stream! {
            let mut conv = manager.lock_owned().await;
            let mut guard = RepeatGuard::default();
            let mut steps: Vec<AgentStep> = Vec::new();
            let mut final_response = String::new();
            let mut iterations = 0u32;
            let mut message = first_message;

            let stop_reason = loop {
                if cancellation.is_cancelled() {
                    break StopReason::Cancelled;
                }
                if iterations >= config.max_iterations {
                    tracing::info!(iterations, "Max iterations reached");
                    break StopReason::MaxIterations;
                }
                iterations += 1;
                tracing::debug!(iteration = iterations, "Agent iteration");

                let mut stream = match conv.send_message(&message).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        final_response = format!("Error: {}", e);
                        conv.add_assistant_response(final_response.clone());
                        tracing::warn!(error = %e, "Model request failed");
                        yield AgentEvent::Error { message: final_response.clone() };
                        break StopReason::TransportError;
                    }
                };
                if let Some(CompressionResult::Compressed { tokens_before, tokens_after, .. }) =
                    conv.take_last_compression()
                {
                    yield AgentEvent::Compressed { tokens_before, tokens_after };
                }

                let mut response = String::new();
                let mut failure = None;
                let mut cancelled = false;
                loop {
                    let next = tokio::select! {
                        chunk = stream.next() => chunk,
                        _ = cancellation.cancelled() => {
                            stream.cancel();
                            cancelled = true;
                            None
                        }
                    };
                    match next {
                        Some(Ok(chunk)) => {
                            response.push_str(&chunk);
                            yield AgentEvent::Text { content: chunk };
                        }
                        Some(Err(e)) => {
                            failure = Some(e);
                            break;
                        }
                        None => break,
                    }
                }

                if let Some(e) = failure {
                    final_response = format!("Error: {}", e);
                    conv.add_assistant_response(final_response.clone());
                    tracing::warn!(error = %e, "Model stream failed");
                    yield AgentEvent::Error { message: final_response.clone() };
                    break StopReason::TransportError;
                }
                if cancelled {
                    if !response.is_empty() {
                        conv.add_assistant_response(response.clone());
                    }
                    final_response = response;
                    break StopReason::Cancelled;
                }

                conv.add_assistant_response(response.clone());
                let calls = parser.parse_tool_calls(&response);
                final_response = response;
                if calls.is_empty() {
                    break StopReason::Completed;
                }

                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    if let Some(matches) = guard.record(&call) {
                        tracing::warn!(tool = %call.tool_name, matches, "Repeated tool call blocked");
                        yield AgentEvent::Error { message: REPEATED_CALLS_MESSAGE.to_string() };
                        results.push((
                            call,
                            ToolResult::error(ErrorKind::ExecutionFailure, REPEATED_CALLS_MESSAGE),
                        ));
                        break;
                    }

                    yield AgentEvent::ToolCall {
                        tool_name: call.tool_name.clone(),
                        params: call.params.clone(),
                    };
                    let result = registry.execute(&call.tool_name, call.params.clone(), &ctx).await;
                    yield AgentEvent::ToolResult {
                        tool_name: call.tool_name.clone(),
                        result: result.clone(),
                    };

                    steps.push(AgentStep {
                        iteration: iterations,
                        tool_name: call.tool_name.clone(),
                        params: call.params.clone(),
                        result: result.clone(),
                    });
                    results.push((call, result));
                }

                conv.add_tool_results(ToolResultFormatter::format_multiple(&results));
                message = CONTINUATION_MESSAGE.to_string();

                if is_stuck(iterations, &steps) {
                    tracing::warn!(iterations, "Agent appears stuck, stopping");
                    break StopReason::Stuck;
                }
            };

            let outcome = AgentOutcome {
                success: stop_reason == StopReason::Completed,
                iterations,
                final_response,
                steps,
                stop_reason,
            };
            tracing::info!(
                iterations = outcome.iterations,
                steps = outcome.steps.len(),
                stop_reason = ?outcome.stop_reason,
                "Agent run finished"
            );
            yield AgentEvent::Done { outcome };
        })
    }

    /// Run `task` and return only the outcome.
    pub async fn run_to_completion(&self, task: &str) -> AgentOutcome {
        let mut events = self.run(task);
        let mut last_error = None;
        while let Some(event) = events.next().await {
            match event {
                AgentEvent::Done { outcome } => return outcome,
                AgentEvent::Error { message } => last_error = Some(message),
                _ => {}
            }
        }
        AgentOutcome {
            success: false,
            iterations: 0,
            final_response: last_error.unwrap_or_default(),
            steps: Vec::new(),
            stop_reason: StopReason::Cancelled,
        }
    }
}

/// More than five iterations and the last five steps all failed.
fn is_stuck(iterations: u32, steps: &[AgentStep]) -> bool {
    iterations > 5 && steps.len() >= 5 && steps.iter().rev().take(5).all(|s| !s.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionConfig;
    use crate::tool::MockTool;
    use devin_llm::{Message, MockClient, MockReply, Role};

    fn executor(client: Arc<MockClient>, registry: ToolRegistry, max_iterations: u32) -> AgentExecutor {
        let manager = ConversationManager::new(
            client,
            "You are a coding agent.",
            CompressionConfig::default(),
            false,
        );
        AgentExecutor::new(
            manager,
            Arc::new(registry),
            ToolCallParser::new(),
            ExecutorConfig {
                max_iterations,
                working_dir: PathBuf::from("/work"),
            },
        )
    }

    fn registry_with(tool: MockTool) -> (ToolRegistry, Arc<MockTool>) {
        let tool = Arc::new(tool);
        let mut registry = ToolRegistry::new();
        registry.register_arc(tool.clone());
        (registry, tool)
    }

    async fn history(executor: &AgentExecutor) -> Vec<Message> {
        executor.manager().lock().await.history().to_vec()
    }

    #[tokio::test]
    async fn test_reply_without_tools_completes() {
        let client = Arc::new(MockClient::with_text("Nothing to do."));
        let exec = executor(client.clone(), ToolRegistry::new(), 10);

        let outcome = exec.run_to_completion("say hi").await;
        assert!(outcome.success);
        assert_eq!(outcome.stop_reason, StopReason::Completed);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.final_response, "Nothing to do.");
        assert_eq!(client.requests()[0].user_text, initial_message("say hi"));
        assert!(client.requests()[0].user_text.starts_with("Task: say hi\n\n"));
    }

    #[tokio::test]
    async fn test_tool_results_feed_next_iteration() {
        let client = Arc::new(MockClient::with_texts([
            "Reading.\n<devin>\n/read-file path=\"a.txt\"\n</devin>",
            "The file says hello.",
        ]));
        let (registry, tool) =
            registry_with(MockTool::new("read-file").with_response(ToolResult::success("hello")));
        let exec = executor(client.clone(), registry, 10);

        let events: Vec<AgentEvent> = exec.run("summarize a.txt").collect().await;
        assert!(events.contains(&AgentEvent::ToolResult {
            tool_name: "read-file".into(),
            result: ToolResult::success("hello"),
        }));
        let Some(AgentEvent::Done { outcome }) = events.last() else {
            panic!("last event must be Done");
        };
        assert!(outcome.success);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.steps.len(), 1);
        assert_eq!(outcome.final_response, "The file says hello.");
        assert_eq!(tool.calls()[0]["path"], "a.txt");

        let requests = client.requests();
        assert_eq!(requests[1].user_text, CONTINUATION_MESSAGE);
        let tool_message = requests[1].history.last().unwrap();
        assert_eq!(tool_message.role, Role::User);
        assert!(tool_message.content.contains("## Tool: read-file"));
        assert!(tool_message.content.contains("Status: SUCCESS"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_reported_to_model() {
        let client = Arc::new(MockClient::with_texts([
            "<devin>\n/teleport target=\"mars\"\n</devin>",
            "Sorry.",
        ]));
        let exec = executor(client.clone(), ToolRegistry::new(), 10);

        let outcome = exec.run_to_completion("go").await;
        assert_eq!(outcome.steps[0].result.error_kind(), Some(ErrorKind::UnknownTool));
        let requests = client.requests();
        let tool_message = &requests[1].history.last().unwrap().content;
        assert!(tool_message.contains("ERROR (UNKNOWN_TOOL)"));
    }

    #[tokio::test]
    async fn test_repeated_calls_are_blocked() {
        let reply = "<devin>\n/shell command=\"ls\"\n</devin>";
        let client = Arc::new(MockClient::with_texts([reply, reply, reply]));
        let (registry, tool) = registry_with(MockTool::new("shell"));
        let exec = executor(client, registry, 3);

        let events: Vec<AgentEvent> = exec.run("list").collect().await;
        assert_eq!(tool.call_count(), 1);
        assert!(events.contains(&AgentEvent::Error {
            message: REPEATED_CALLS_MESSAGE.to_string()
        }));
        let Some(AgentEvent::Done { outcome }) = events.last() else {
            panic!("last event must be Done");
        };
        assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        assert!(!outcome.success);
    }

    #[test]
    fn test_repeat_guard_thresholds() {
        let call = |name: &str, path: &str| ToolInvocation {
            tool_name: name.into(),
            params: serde_json::json!({"path": path}).as_object().cloned().unwrap(),
            raw_span: String::new(),
        };
        let mut guard = RepeatGuard::default();
        assert_eq!(guard.record(&call("read-file", "a")), None);
        assert_eq!(guard.record(&call("read-file", "a")), None);
        assert_eq!(guard.record(&call("read-file", "a")), Some(3));

        let mut guard = RepeatGuard::default();
        assert_eq!(guard.record(&call("glob", "a")), None);
        assert_eq!(guard.record(&call("glob", "b")), None);
        assert_eq!(guard.record(&call("glob", "a")), Some(2));
        assert_eq!(
            RepeatGuard::signature(&call("glob", "a")),
            "glob:path=\"a\""
        );
    }

    #[tokio::test]
    async fn test_transport_error_becomes_assistant_message() {
        let client = Arc::new(MockClient::new(vec![MockReply::Error("connection refused".into())]));
        let exec = executor(client, ToolRegistry::new(), 10);

        let outcome = exec.run_to_completion("anything").await;
        assert_eq!(outcome.stop_reason, StopReason::TransportError);
        assert!(outcome.final_response.starts_with("Error: "));
        assert!(outcome.final_response.contains("connection refused"));

        let history = history(&exec).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].content, initial_message("anything"));
        assert_eq!(history[2].role, Role::Assistant);
        assert_eq!(history[2].content, outcome.final_response);
    }

    #[tokio::test]
    async fn test_max_iterations() {
        let client = Arc::new(MockClient::with_texts([
            "<devin>\n/grep pattern=\"a\"\n</devin>",
            "<devin>\n/grep pattern=\"b\"\n</devin>",
        ]));
        let (registry, tool) = registry_with(MockTool::new("grep"));
        let exec = executor(client, registry, 2);

        let outcome = exec.run_to_completion("search").await;
        assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(tool.call_count(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = Arc::new(MockClient::with_text("unused"));
        let token = CancellationToken::new();
        token.cancel();
        let exec = executor(client.clone(), ToolRegistry::new(), 10).with_cancellation(token);

        let outcome = exec.run_to_completion("task").await;
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_stream_keeps_partial_reply() {
        let client = Arc::new(MockClient::new(vec![MockReply::Hang(vec!["Working on".into()])]));
        let token = CancellationToken::new();
        let exec = executor(client.clone(), ToolRegistry::new(), 10).with_cancellation(token.clone());

        let mut events = exec.run("long task");
        assert_eq!(
            events.next().await,
            Some(AgentEvent::Text { content: "Working on".into() })
        );
        token.cancel();
        let mut outcome = None;
        while let Some(event) = events.next().await {
            if let AgentEvent::Done { outcome: o } = event {
                outcome = Some(o);
            }
        }
        drop(events);

        let outcome = outcome.unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(client.cancellations(), 1);
        assert_eq!(history(&exec).await.last().unwrap().content, "Working on");
    }

    #[test]
    fn test_is_stuck() {
        let failed = AgentStep {
            iteration: 1,
            tool_name: "shell".into(),
            params: ToolParams::new(),
            result: ToolResult::error(ErrorKind::ExecutionFailure, "boom"),
        };
        let steps = vec![failed.clone(); 5];
        assert!(is_stuck(6, &steps));
        assert!(!is_stuck(5, &steps));
        let mut mixed = steps.clone();
        mixed[4].result = ToolResult::success("ok");
        assert!(!is_stuck(6, &mixed));
    }
}
