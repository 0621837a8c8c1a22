//! Tools for collecting background shell sessions.
//!
//! `shell` hands long commands to a background task and returns a session id.
//! `read-process` checks on a session without blocking; `wait-process` blocks
//! until it finishes or a timeout passes. Either one hands over the final
//! result exactly once and drops the session from the table.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::file::catalog_metadata;
use crate::error::Result;
use crate::tool::{
    ErrorKind, ParamExt, SessionStatus, Tool, ToolCategory, ToolContext, ToolParams, ToolResult,
    ToolType,
};

const DEFAULT_WAIT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn unknown_session(session_id: &str) -> ToolResult {
    ToolResult::error(
        ErrorKind::InvalidArguments,
        format!(
            "Unknown session '{}': it never existed or its result was already collected",
            session_id
        ),
    )
}

/// Non-blocking status check of a background session.
#[derive(Debug, Default)]
pub struct ReadProcessTool;

impl ReadProcessTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for ReadProcessTool {
    catalog_metadata!(ToolType::ReadProcess);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        let session_id = params.required_str("session_id", "the id from a pending shell result")?;

        Ok(match ctx.pending.poll(session_id) {
            SessionStatus::Finished(result) => result,
            SessionStatus::Running { command } => {
                ToolResult::pending(session_id, command, "Command is still running")
            }
            SessionStatus::Unknown => unknown_session(session_id),
        })
    }
}

/// Blocks until a background session finishes.
#[derive(Debug)]
pub struct WaitProcessTool {
    default_wait: Duration,
}

impl Default for WaitProcessTool {
    fn default() -> Self {
        Self {
            default_wait: DEFAULT_WAIT,
        }
    }
}

impl WaitProcessTool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Tool for WaitProcessTool {
    catalog_metadata!(ToolType::WaitProcess);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        let session_id = params.required_str("session_id", "the id from a pending shell result")?;
        let wait = params
            .optional_u64("timeout")?
            .map(Duration::from_secs)
            .unwrap_or(self.default_wait);
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let command = match ctx.pending.poll(session_id) {
                SessionStatus::Finished(result) => return Ok(result),
                SessionStatus::Unknown => return Ok(unknown_session(session_id)),
                SessionStatus::Running { command } => command,
            };

            if tokio::time::Instant::now() >= deadline {
                tracing::debug!(session = %session_id, "Background command still running after wait");
                return Ok(ToolResult::pending(
                    session_id,
                    command,
                    format!("Command is still running after waiting {}s", wait.as_secs()),
                ));
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = ctx.cancellation.cancelled() => {
                    return Ok(ToolResult::error(ErrorKind::ExecutionFailure, "Wait cancelled"));
                }
            }
        }
    }
}
