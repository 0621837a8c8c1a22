//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
///
/// Most of these never reach the host: tool errors become
/// [`ToolResult::Error`](crate::tool::ToolResult) at the registry boundary, and
/// parse and compression errors are recovered where they occur.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No tool is registered under this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool parameters failed validation.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// A tool ran and failed.
    #[error("Tool '{tool}' failed: {cause}")]
    ExecutionFailure { tool: String, cause: String },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// A `<devin>` block could not be parsed and was skipped.
    #[error("Malformed tool block: {0}")]
    ParseMalformedBlock(String),

    /// History summarization failed; the history is unchanged.
    #[error("Compression failed: {0}")]
    CompressionFailure(String),

    /// Model backend or HTTP transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] devin_llm::LlmError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task was cancelled.
    #[error("Task cancelled")]
    Cancelled,

    /// Maximum iterations exceeded.
    #[error("Maximum iterations exceeded: {0}")]
    MaxIterations(u32),
}

impl AgentError {
    /// Create an execution failure for `tool`.
    pub fn tool(tool: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::ExecutionFailure {
            tool: tool.into(),
            cause: cause.into(),
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
