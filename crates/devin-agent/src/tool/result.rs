//! Tool results and the stable error-kind taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─────────────────────────────────────────────────────────────────────────────
// Error Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Machine-readable category of a failed tool call.
///
/// The string forms are stable; they appear in formatted results the model
/// reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    UnknownTool,
    InvalidArguments,
    ExecutionFailure,
    InternalError,
    PermissionDenied,
    Timeout,
    FileNotFound,
}

impl ErrorKind {
    /// The stable string form, e.g. `UNKNOWN_TOOL`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTool => "UNKNOWN_TOOL",
            Self::InvalidArguments => "INVALID_ARGUMENTS",
            Self::ExecutionFailure => "EXECUTION_FAILURE",
            Self::InternalError => "INTERNAL_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Timeout => "TIMEOUT",
            Self::FileNotFound => "FILE_NOT_FOUND",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    /// The tool completed.
    Success {
        /// Output text.
        content: String,
        /// Extra key/value facts about the run (exit code, byte count, ...).
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        metadata: BTreeMap<String, String>,
    },
    /// The tool failed.
    Error {
        /// Human-readable message.
        message: String,
        /// Stable category.
        error_kind: ErrorKind,
    },
    /// The tool is still running in the background.
    Pending {
        /// Identifier to resolve the final result later.
        session_id: String,
        /// What was started.
        command: String,
        /// Status message for the model.
        message: String,
    },
}

impl ToolResult {
    /// Create a success result.
    pub fn success(content: impl Into<String>) -> Self {
        Self::Success {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Create an error result.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            error_kind: kind,
        }
    }

    /// Create a pending result.
    pub fn pending(
        session_id: impl Into<String>,
        command: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Pending {
            session_id: session_id.into(),
            command: command.into(),
            message: message.into(),
        }
    }

    /// Attach a metadata entry. No-op for non-success results.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let Self::Success { metadata, .. } = &mut self {
            metadata.insert(key.into(), value.to_string());
        }
        self
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Check if this result is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Check if the tool is still running.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// The error kind, for error results.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { error_kind, .. } => Some(*error_kind),
            _ => None,
        }
    }

    /// Get the content as a string for LLM consumption.
    pub fn to_llm_content(&self) -> String {
        match self {
            Self::Success { content, .. } => content.clone(),
            Self::Error {
                message,
                error_kind,
            } => format!("Error ({}): {}", error_kind, message),
            Self::Pending {
                session_id,
                message,
                ..
            } => format!("{} (session {})", message, session_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_metadata() {
        let result = ToolResult::success("done")
            .with_metadata("exit_code", 0)
            .with_metadata("bytes", 4);
        assert!(result.is_success());
        match &result {
            ToolResult::Success { metadata, .. } => {
                assert_eq!(metadata.get("exit_code").map(String::as_str), Some("0"));
                assert_eq!(metadata.len(), 2);
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_metadata_ignored_on_error() {
        let result = ToolResult::error(ErrorKind::Timeout, "slow").with_metadata("k", "v");
        assert_eq!(result, ToolResult::error(ErrorKind::Timeout, "slow"));
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    }

    #[test]
    fn test_exactly_one_predicate_holds() {
        for result in [
            ToolResult::success("x"),
            ToolResult::error(ErrorKind::InternalError, "x"),
            ToolResult::pending("s", "c", "m"),
        ] {
            let flags = [result.is_success(), result.is_error(), result.is_pending()];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        }
    }

    #[test]
    fn test_serialization_shape() {
        let json = serde_json::to_value(ToolResult::error(ErrorKind::UnknownTool, "nope")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_kind"], "UNKNOWN_TOOL");

        let json = serde_json::to_value(ToolResult::success("ok")).unwrap();
        assert_eq!(json["status"], "success");
        assert!(json.get("metadata").is_none());
    }

    #[test]
    fn test_error_kind_strings_match_serde() {
        for kind in [
            ErrorKind::UnknownTool,
            ErrorKind::InvalidArguments,
            ErrorKind::ExecutionFailure,
            ErrorKind::InternalError,
            ErrorKind::PermissionDenied,
            ErrorKind::Timeout,
            ErrorKind::FileNotFound,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json.as_str(), Some(kind.as_str()));
        }
    }

    #[test]
    fn test_to_llm_content() {
        assert_eq!(ToolResult::success("hi").to_llm_content(), "hi");
        assert_eq!(
            ToolResult::error(ErrorKind::FileNotFound, "a.txt").to_llm_content(),
            "Error (FILE_NOT_FOUND): a.txt"
        );
        assert!(
            ToolResult::pending("abc", "npm start", "still running")
                .to_llm_content()
                .contains("abc")
        );
    }
}
