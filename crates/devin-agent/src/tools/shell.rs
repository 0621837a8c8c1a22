//! Shell command tool.
//!
//! Commands run through the host's [`ShellExecutor`]. When a pending threshold
//! is configured, a command still running after it is handed to a background
//! task and the call returns [`ToolResult::Pending`]; the task records the
//! final result in the context's [`PendingSessions`](crate::tool::PendingSessions).

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::file::catalog_metadata;
use crate::error::Result;
use crate::tool::{
    ErrorKind, ParamExt, ShellExecutor, ShellOutput, Tool, ToolCategory, ToolContext, ToolParams,
    ToolResult, ToolType,
};

/// Timeout and backgrounding settings for [`ShellTool`].
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Kill commands after this long.
    pub timeout: Duration,
    /// Return `Pending` for commands still running after this long.
    pub pending_after: Option<Duration>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            pending_after: None,
        }
    }
}

/// Runs shell commands.
pub struct ShellTool {
    shell: Arc<dyn ShellExecutor>,
    config: ShellConfig,
}

impl ShellTool {
    pub fn new(shell: Arc<dyn ShellExecutor>, config: ShellConfig) -> Self {
        Self { shell, config }
    }
}

fn output_to_result(output: ShellOutput, timeout: Duration) -> ToolResult {
    if output.timed_out {
        return ToolResult::error(
            ErrorKind::Timeout,
            format!("Command timed out after {}s", timeout.as_secs()),
        );
    }

    let combined = output.combined();
    match output.exit_code {
        Some(0) => ToolResult::success(combined).with_metadata("exit_code", 0),
        Some(code) => ToolResult::error(
            ErrorKind::ExecutionFailure,
            format!("Command exited with code {}\n{}", code, combined),
        ),
        None => ToolResult::error(
            ErrorKind::ExecutionFailure,
            format!("Command was terminated by a signal\n{}", combined),
        ),
    }
}

fn joined_to_result(
    joined: std::result::Result<std::io::Result<ShellOutput>, tokio::task::JoinError>,
    timeout: Duration,
) -> ToolResult {
    match joined {
        Ok(Ok(output)) => output_to_result(output, timeout),
        Ok(Err(e)) => ToolResult::error(
            ErrorKind::ExecutionFailure,
            format!("Failed to run command: {}", e),
        ),
        Err(e) => ToolResult::error(
            ErrorKind::InternalError,
            format!("Shell task failed: {}", e),
        ),
    }
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

#[async_trait]
impl Tool for ShellTool {
    catalog_metadata!(ToolType::Shell);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        let command = params
            .required_str("command", "the command line to run")?
            .to_string();

        if !self.shell.is_available() {
            return Ok(ToolResult::error(
                ErrorKind::ExecutionFailure,
                "Shell execution is not available on this host",
            ));
        }

        let timeout = params
            .optional_u64("timeout")?
            .map(Duration::from_secs)
            .unwrap_or(self.config.timeout);
        let pending_after = self.config.pending_after.filter(|p| *p < timeout);

        let shell = Arc::clone(&self.shell);
        let working_dir = ctx.working_dir().to_path_buf();
        let task_command = command.clone();
        let mut handle = tokio::spawn(async move {
            shell.execute(&task_command, &working_dir, timeout).await
        });

        let finished = tokio::select! {
            joined = &mut handle => Some(joined),
            _ = sleep_or_forever(pending_after) => None,
            _ = ctx.cancellation.cancelled() => {
                handle.abort();
                return Ok(ToolResult::error(ErrorKind::ExecutionFailure, "Command cancelled"));
            }
        };

        if let Some(joined) = finished {
            return Ok(joined_to_result(joined, timeout));
        }

        let session_id = ctx.pending.register(&command);
        tracing::debug!(session = %session_id, command = %command, "Shell command moved to background");

        let sessions = ctx.pending.clone();
        let background_id = session_id.clone();
        tokio::spawn(async move {
            let result = joined_to_result(handle.await, timeout);
            if let Err(e) = sessions.complete(&background_id, result) {
                tracing::warn!(session = %background_id, error = %e, "Failed to record shell result");
            }
        });

        let waited = pending_after.map(|d| d.as_secs()).unwrap_or_default();
        Ok(ToolResult::pending(
            session_id,
            command,
            format!(
                "Command is still running after {}s and continues in the background",
                waited
            ),
        ))
    }
}
