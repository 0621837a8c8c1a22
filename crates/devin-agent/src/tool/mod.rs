//! Tool framework for agent capabilities.
//!
//! This module defines the [`Tool`] trait that all agent tools implement, the
//! [`ToolRegistry`] that dispatches calls by name, and the [`ToolProvider`]
//! system that builds tools from a capability bundle.
//!
//! # Example
//!
//! ```rust,ignore
//! use devin_agent::tool::{Tool, ToolContext, ToolParams, ToolRegistry, ToolResult};
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Tool for Echo {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> &str { "Repeat the content back" }
//!     fn parameters(&self) -> Value { json!({"type": "object"}) }
//!
//!     async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
//!         Ok(ToolResult::success(params.optional_str("content").unwrap_or_default()))
//!     }
//! }
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(Echo);
//! ```

pub mod catalog;
pub mod deps;
pub mod params;
pub mod pending;
pub mod provider;
pub mod registry;
pub mod result;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use catalog::{ToolType, default_param_for};
pub use deps::{
    ClientSubAgents, FileInfo, FileSystem, ShellExecutor, ShellOutput, SubAgentManager,
    ToolDependencies,
};
pub use params::{ParamExt, ParamResult, ParameterValidationError, ToolParams, value_to_text};
pub use pending::{PendingSessions, SessionStatus};
pub use provider::{ProviderSet, ToolProvider};
pub use registry::ToolRegistry;
pub use result::{ErrorKind, ToolResult};

// ─────────────────────────────────────────────────────────────────────────────
// Tool Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Broad grouping used to gate tool exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    FileSystem,
    Search,
    Execution,
    Network,
    SubAgent,
    Other,
}

impl ToolCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileSystem => "file_system",
            Self::Search => "search",
            Self::Execution => "execution",
            Self::Network => "network",
            Self::SubAgent => "sub_agent",
            Self::Other => "other",
        }
    }
}

/// Trait for agent tools.
///
/// Each tool describes its parameters as a JSON Schema and executes
/// asynchronously. Errors returned from [`execute`](Tool::execute) are turned
/// into [`ToolResult::Error`] by the registry; a tool may also return an error
/// result directly when it wants to pick the [`ErrorKind`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the unique name of this tool.
    fn name(&self) -> &str;

    /// Get a human-readable description of what this tool does.
    fn description(&self) -> &str;

    /// Get the JSON Schema for this tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    fn category(&self) -> ToolCategory {
        ToolCategory::Other
    }

    /// Example invocations shown to the model.
    fn examples(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the tool reads or writes the file system.
    fn requires_file_system(&self) -> bool {
        matches!(
            self.category(),
            ToolCategory::FileSystem | ToolCategory::Search
        )
    }

    /// Whether the tool changes state: runs commands or writes files.
    fn is_execution_tool(&self) -> bool {
        self.category() == ToolCategory::Execution
    }

    /// Execute the tool with the given parameters.
    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Static description of a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameter_schema: serde_json::Value,
    pub category: ToolCategory,
    pub examples: Vec<String>,
}

impl ToolDescriptor {
    /// Describe a tool.
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameter_schema: tool.parameters(),
            category: tool.category(),
            examples: tool.examples(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Context
// ─────────────────────────────────────────────────────────────────────────────

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Token to check for cancellation.
    pub cancellation: CancellationToken,
    /// Directory relative paths resolve against.
    pub working_dir: PathBuf,
    /// Background sessions started by tools.
    pub pending: PendingSessions,
}

impl ToolContext {
    /// Create a context rooted at `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            working_dir: working_dir.into(),
            pending: PendingSessions::new(),
        }
    }

    /// Use an existing cancellation token.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Share a pending-session table.
    pub fn with_pending(mut self, pending: PendingSessions) -> Self {
        self.pending = pending;
        self
    }

    /// Check if execution has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(".")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Tool (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A mock tool for testing.
///
/// Returns a configurable response and tracks calls for verification.
#[cfg(test)]
#[derive(Debug)]
pub struct MockTool {
    name: String,
    category: ToolCategory,
    response: std::sync::Mutex<Option<ToolResult>>,
    calls: std::sync::Mutex<Vec<ToolParams>>,
}

#[cfg(test)]
impl MockTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: ToolCategory::Other,
            response: std::sync::Mutex::new(None),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_response(self, response: ToolResult) -> Self {
        *self.response.lock().unwrap() = Some(response);
        self
    }

    pub fn calls(&self) -> Vec<ToolParams> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[cfg(test)]
#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A mock tool for testing"
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn category(&self) -> ToolCategory {
        self.category
    }

    async fn execute(&self, params: ToolParams, _ctx: &ToolContext) -> Result<ToolResult> {
        self.calls.lock().unwrap().push(params);
        Ok(self
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ToolResult::success("mock response")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_defaults_follow_category() {
        let fs = MockTool::new("a").with_category(ToolCategory::FileSystem);
        assert!(fs.requires_file_system());
        assert!(!fs.is_execution_tool());

        let search = MockTool::new("b").with_category(ToolCategory::Search);
        assert!(search.requires_file_system());

        let exec = MockTool::new("c").with_category(ToolCategory::Execution);
        assert!(exec.is_execution_tool());
        assert!(!exec.requires_file_system());

        let net = MockTool::new("d").with_category(ToolCategory::Network);
        assert!(!net.requires_file_system());
        assert!(!net.is_execution_tool());
    }

    #[test]
    fn test_descriptor_of() {
        let descriptor = ToolDescriptor::of(&MockTool::new("probe"));
        assert_eq!(descriptor.name, "probe");
        assert_eq!(descriptor.category, ToolCategory::Other);
        assert_eq!(descriptor.parameter_schema["type"], "object");
    }

    #[test]
    fn test_tool_context() {
        let token = CancellationToken::new();
        let ctx = ToolContext::new("/work").with_cancellation(token.clone());
        assert_eq!(ctx.working_dir(), Path::new("/work"));
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
