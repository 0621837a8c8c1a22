//! Rendering tool results and tool lists as model-facing text.

use crate::parser::{BLOCK_END, BLOCK_START, ToolInvocation};
use crate::tool::{ToolDescriptor, ToolParams, ToolResult, value_to_text};

/// Parameter values longer than this are shortened in result headers.
const MAX_PARAM_DISPLAY: usize = 120;

/// Formats tool output for the conversation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolResultFormatter;

impl ToolResultFormatter {
    /// Render one result.
    ///
    /// ```text
    /// ## Tool: read-file
    /// Parameters: path="config.yaml"
    /// Status: SUCCESS
    /// Output:
    /// ...
    /// ```
    pub fn format(tool_name: &str, params: &ToolParams, result: &ToolResult) -> String {
        let mut out = format!("## Tool: {}\n", tool_name);
        if !params.is_empty() {
            out.push_str("Parameters: ");
            out.push_str(&format_params(params));
            out.push('\n');
        }

        match result {
            ToolResult::Success { content, .. } => {
                out.push_str("Status: SUCCESS\nOutput:\n");
                out.push_str(content);
            }
            ToolResult::Error {
                message,
                error_kind,
            } => {
                out.push_str(&format!("Status: ERROR ({})\n", error_kind));
                out.push_str(message);
            }
            ToolResult::Pending {
                session_id,
                command,
                message,
            } => {
                out.push_str("Status: PENDING\n");
                out.push_str(&format!("Session: {}\nCommand: {}\n{}", session_id, command, message));
                out.push_str(&format!(
                    "\nCollect the result with /wait-process session_id=\"{}\" or check on it with /read-process",
                    session_id
                ));
            }
        }
        out
    }

    /// Render results in invocation order, separated by blank lines.
    pub fn format_multiple(results: &[(ToolInvocation, ToolResult)]) -> String {
        results
            .iter()
            .map(|(call, result)| Self::format(&call.tool_name, &call.params, result))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render the tool section of a system prompt.
    pub fn format_tool_list(tools: &[ToolDescriptor]) -> String {
        if tools.is_empty() {
            return "No tools available.".to_string();
        }

        tools
            .iter()
            .map(|tool| {
                let schema = serde_json::to_string_pretty(&tool.parameter_schema)
                    .unwrap_or_else(|_| tool.parameter_schema.to_string());
                let mut section = format!(
                    "## {}\n**Description:** {}\n**Parameters:**\n```json\n{}\n```",
                    tool.name, tool.description, schema
                );
                if let Some(example) = tool.examples.first() {
                    section.push_str(&format!(
                        "\n**Example:**\n{}\n{}\n{}",
                        BLOCK_START, example, BLOCK_END
                    ));
                }
                section
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn format_params(params: &ToolParams) -> String {
    params
        .iter()
        .map(|(key, value)| {
            let text = value_to_text(value);
            let shown = if text.chars().count() > MAX_PARAM_DISPLAY {
                let head: String = text.chars().take(MAX_PARAM_DISPLAY).collect();
                format!("{}... ({} chars)", head, text.chars().count())
            } else {
                text
            };
            format!("{}=\"{}\"", key, shown.replace('"', "\"\""))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ErrorKind, ToolCategory};
    use serde_json::{Value, json};

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    fn invocation(name: &str, p: Value) -> ToolInvocation {
        ToolInvocation {
            tool_name: name.into(),
            params: params(p),
            raw_span: String::new(),
        }
    }

    #[test]
    fn test_success_contains_name_params_and_content() {
        let p = params(json!({"path": "config.yaml", "start_line": 3}));
        let content = "port: 8080\nhost: \"localhost\"\n";
        let text = ToolResultFormatter::format("read-file", &p, &ToolResult::success(content));
        assert!(text.contains("read-file"));
        assert!(text.contains("path=\"config.yaml\""));
        assert!(text.contains("start_line=\"3\""));
        assert!(text.contains("Status: SUCCESS"));
        assert!(text.ends_with(content));
    }

    #[test]
    fn test_error_contains_kind_and_message() {
        let result = ToolResult::error(ErrorKind::FileNotFound, "missing.txt: not found");
        let text = ToolResultFormatter::format("read-file", &ToolParams::new(), &result);
        assert!(text.contains("Status: ERROR (FILE_NOT_FOUND)"));
        assert!(text.contains("missing.txt: not found"));
        assert!(!text.contains("Parameters:"));
    }

    #[test]
    fn test_pending() {
        let result = ToolResult::pending("abc-123", "npm run dev", "still running");
        let text = ToolResultFormatter::format("shell", &params(json!({"command": "npm run dev"})), &result);
        assert!(text.contains("Status: PENDING"));
        assert!(text.contains("Session: abc-123"));
        assert!(text.contains("still running"));
        assert!(text.contains("/wait-process session_id=\"abc-123\""));
    }

    #[test]
    fn test_long_params_are_shortened() {
        let long = "x".repeat(500);
        let text = ToolResultFormatter::format(
            "write-file",
            &params(json!({"path": "a.txt", "content": long})),
            &ToolResult::success("Created a.txt"),
        );
        assert!(text.contains("content=\""));
        assert!(text.contains("(500 chars)"));
        assert!(!text.contains(&"x".repeat(200)));
    }

    #[test]
    fn test_format_multiple_keeps_order() {
        let text = ToolResultFormatter::format_multiple(&[
            (invocation("glob", json!({"pattern": "*.rs"})), ToolResult::success("lib.rs")),
            (
                invocation("shell", json!({"command": "false"})),
                ToolResult::error(ErrorKind::ExecutionFailure, "exit 1"),
            ),
        ]);
        let glob = text.find("## Tool: glob").unwrap();
        let shell = text.find("## Tool: shell").unwrap();
        assert!(glob < shell);
        assert!(text.contains("lib.rs\n\n## Tool: shell"));
    }

    #[test]
    fn test_format_tool_list() {
        assert_eq!(ToolResultFormatter::format_tool_list(&[]), "No tools available.");

        let tools = vec![ToolDescriptor {
            name: "glob".into(),
            description: "Find files".into(),
            parameter_schema: json!({"type": "object"}),
            category: ToolCategory::Search,
            examples: vec!["/glob pattern=\"*.rs\"".into()],
        }];
        let text = ToolResultFormatter::format_tool_list(&tools);
        assert!(text.starts_with("## glob\n**Description:** Find files"));
        assert!(text.contains("```json\n{\n  \"type\": \"object\"\n}\n```"));
        assert!(text.ends_with("<devin>\n/glob pattern=\"*.rs\"\n</devin>"));
    }
}
