//! Tool-calling conversation engine for Devin.
//!
//! This crate turns a streaming LLM client into an agent that can read and
//! write files, search, run commands, and consult other agents. The model
//! calls tools by writing `<devin>` blocks in plain text; results go back to
//! it as text too.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  AgentExecutor                                               │
//! │  - Iterates send → parse → execute → format                  │
//! │  - Repeat detection, iteration limit, cancellation           │
//! └──────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//! ┌─────────────────┐  ┌────────────────┐  ┌────────────────────┐
//! │ Conversation    │  │ ToolCallParser │  │ ToolRegistry       │
//! │ Manager         │  │ (<devin> only) │  │ (providers → tools)│
//! │ + Compressor    │  └────────────────┘  └────────────────────┘
//! └─────────────────┘
//!          │
//!          ▼
//!   LlmClient (devin-llm)
//! ```
//!
//! # Core Components
//!
//! - [`ConversationManager`]: history, compression, and one request per turn
//! - [`ToolCallParser`]: extracts [`ToolInvocation`]s from model output
//! - [`ToolRegistry`]: name → tool map that never lets a tool failure escape
//! - [`ToolResultFormatter`]: renders results and tool lists for the model
//! - [`AgentExecutor`]: the full agent loop as a stream of [`AgentEvent`]s

pub mod compression;
pub mod conversation;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod parser;
pub mod tool;
pub mod tools;

pub use error::{AgentError, Result};

// Conversation
pub use compression::{
    CompressionConfig, CompressionResult, CompressionStatus, ContextCompressor, SUMMARY_PREFIX,
};
pub use conversation::{ConversationManager, ConversationState, estimate_tokens};

// Parsing and formatting
pub use formatter::ToolResultFormatter;
pub use parser::{DevinBlock, ToolCallParser, ToolInvocation, extract_devin_blocks};

// Tools
pub use tool::{
    ClientSubAgents, ErrorKind, FileInfo, FileSystem, PendingSessions, ProviderSet, SessionStatus,
    ShellExecutor, ShellOutput, SubAgentManager, Tool, ToolCategory, ToolContext,
    ToolDependencies, ToolDescriptor, ToolParams, ToolProvider, ToolRegistry, ToolResult, ToolType,
};
pub use tools::{BuiltinToolProvider, ShellConfig};

// Agent loop
pub use executor::{
    AgentEvent, AgentExecutor, AgentOutcome, AgentStep, AgentStream, ExecutorConfig, StopReason,
};
