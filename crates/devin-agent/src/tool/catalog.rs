//! The built-in tool catalog.
//!
//! Names, descriptions, schemas and examples for every tool the engine ships
//! with. The parser uses [`ToolType::default_param`] to map a bare argument
//! (`/read-file src/main.rs`) onto the right parameter.

use serde_json::{Value, json};

use super::ToolCategory;

/// A built-in tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolType {
    ReadFile,
    WriteFile,
    EditFile,
    ListFiles,
    Glob,
    Grep,
    Shell,
    ReadProcess,
    WaitProcess,
    WebFetch,
    AskAgent,
}

impl ToolType {
    /// Every built-in tool, in catalog order.
    pub const ALL: [ToolType; 11] = [
        ToolType::ReadFile,
        ToolType::WriteFile,
        ToolType::EditFile,
        ToolType::ListFiles,
        ToolType::Glob,
        ToolType::Grep,
        ToolType::Shell,
        ToolType::ReadProcess,
        ToolType::WaitProcess,
        ToolType::WebFetch,
        ToolType::AskAgent,
    ];

    /// Look up a built-in tool by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadFile => "read-file",
            Self::WriteFile => "write-file",
            Self::EditFile => "edit-file",
            Self::ListFiles => "list-files",
            Self::Glob => "glob",
            Self::Grep => "grep",
            Self::Shell => "shell",
            Self::ReadProcess => "read-process",
            Self::WaitProcess => "wait-process",
            Self::WebFetch => "web-fetch",
            Self::AskAgent => "ask-agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ReadFile => {
                "Read a file from the project. Optionally restrict to a line range with start_line/end_line."
            }
            Self::WriteFile => {
                "Create or overwrite a file. Put the file body in a fenced code block after the command."
            }
            Self::EditFile => {
                "Replace an exact snippet of text in a file. old_text must occur exactly once."
            }
            Self::ListFiles => "List files in a directory, optionally recursively.",
            Self::Glob => "Find files whose paths match a glob pattern such as **/*.rs.",
            Self::Grep => {
                "Search file contents with a regular expression. Returns path:line: text matches."
            }
            Self::Shell => {
                "Run a shell command in the working directory. Long-running commands continue in the background."
            }
            Self::ReadProcess => {
                "Check a background command started by shell. Returns its result once it has finished."
            }
            Self::WaitProcess => {
                "Wait for a background command started by shell to finish, up to timeout seconds."
            }
            Self::WebFetch => {
                "Fetch a web page and return its text. Give a prompt to have the page summarized."
            }
            Self::AskAgent => "Ask a configured agent a question and return its answer.",
        }
    }

    pub fn category(&self) -> ToolCategory {
        match self {
            Self::ReadFile | Self::WriteFile | Self::EditFile | Self::ListFiles => {
                ToolCategory::FileSystem
            }
            Self::Glob | Self::Grep => ToolCategory::Search,
            Self::Shell | Self::ReadProcess | Self::WaitProcess => ToolCategory::Execution,
            Self::WebFetch => ToolCategory::Network,
            Self::AskAgent => ToolCategory::SubAgent,
        }
    }

    /// Parameter that receives a bare argument with no `key="value"` syntax.
    pub fn default_param(&self) -> &'static str {
        match self {
            Self::ReadFile | Self::WriteFile | Self::EditFile | Self::ListFiles => "path",
            Self::Glob | Self::Grep => "pattern",
            Self::Shell => "command",
            Self::ReadProcess | Self::WaitProcess => "session_id",
            Self::WebFetch => "url",
            Self::AskAgent => "content",
        }
    }

    /// An example invocation, as it would appear inside a `<devin>` block.
    pub fn example(&self) -> &'static str {
        match self {
            Self::ReadFile => "/read-file path=\"src/main.rs\" start_line=\"1\" end_line=\"40\"",
            Self::WriteFile => "/write-file path=\"notes/todo.md\"\n```markdown\n# TODO\n```",
            Self::EditFile => {
                "/edit-file path=\"Cargo.toml\" old_text=\"version = \"\"0.1.0\"\"\" new_text=\"version = \"\"0.2.0\"\"\""
            }
            Self::ListFiles => "/list-files path=\"src\" recursive=\"true\"",
            Self::Glob => "/glob pattern=\"**/*.rs\"",
            Self::Grep => "/grep pattern=\"fn main\" path=\"src\"",
            Self::Shell => "/shell command=\"cargo test\"",
            Self::ReadProcess => "/read-process session_id=\"3f2b9c1e-0d4a-4c55-9a8e-2f6d7b1c0e94\"",
            Self::WaitProcess => {
                "/wait-process session_id=\"3f2b9c1e-0d4a-4c55-9a8e-2f6d7b1c0e94\" timeout=\"60\""
            }
            Self::WebFetch => "/web-fetch url=\"https://example.com\" prompt=\"List the headings\"",
            Self::AskAgent => "/ask-agent agent=\"reviewer\" content=\"Review the error handling in src/lib.rs\"",
        }
    }

    /// JSON Schema for the tool's parameters.
    pub fn schema(&self) -> Value {
        match self {
            Self::ReadFile => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "File to read"},
                    "start_line": {"type": "integer", "description": "First line, 1-based"},
                    "end_line": {"type": "integer", "description": "Last line, inclusive"}
                },
                "required": ["path"]
            }),
            Self::WriteFile => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "File to write"},
                    "content": {"type": "string", "description": "Full file body"}
                },
                "required": ["path", "content"]
            }),
            Self::EditFile => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "File to edit"},
                    "old_text": {"type": "string", "description": "Exact text to replace"},
                    "new_text": {"type": "string", "description": "Replacement text"}
                },
                "required": ["path", "old_text", "new_text"]
            }),
            Self::ListFiles => json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Directory, defaults to the working directory"},
                    "recursive": {"type": "boolean", "description": "Descend into subdirectories"}
                }
            }),
            Self::Glob => json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string", "description": "Glob such as **/*.rs"},
                    "path": {"type": "string", "description": "Directory to search"}
                },
                "required": ["pattern"]
            }),
            Self::Grep => json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string", "description": "Regular expression"},
                    "path": {"type": "string", "description": "Directory to search"},
                    "glob": {"type": "string", "description": "Only search files matching this glob"},
                    "case_insensitive": {"type": "boolean"}
                },
                "required": ["pattern"]
            }),
            Self::Shell => json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "description": "Command line to run"},
                    "timeout": {"type": "integer", "description": "Timeout in seconds"}
                },
                "required": ["command"]
            }),
            Self::ReadProcess => json!({
                "type": "object",
                "properties": {
                    "session_id": {"type": "string", "description": "Id from a pending shell result"}
                },
                "required": ["session_id"]
            }),
            Self::WaitProcess => json!({
                "type": "object",
                "properties": {
                    "session_id": {"type": "string", "description": "Id from a pending shell result"},
                    "timeout": {"type": "integer", "description": "Seconds to wait, default 30"}
                },
                "required": ["session_id"]
            }),
            Self::WebFetch => json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "http or https URL"},
                    "prompt": {"type": "string", "description": "What to extract from the page"}
                },
                "required": ["url"]
            }),
            Self::AskAgent => json!({
                "type": "object",
                "properties": {
                    "agent": {"type": "string", "description": "Configured agent name"},
                    "content": {"type": "string", "description": "Question for the agent"}
                },
                "required": ["agent", "content"]
            }),
        }
    }
}

impl std::fmt::Display for ToolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Default simple parameter for any tool name, built-in or not.
pub fn default_param_for(tool_name: &str) -> &'static str {
    ToolType::from_name(tool_name)
        .map(|t| t.default_param())
        .unwrap_or("content")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for tool in ToolType::ALL {
            assert_eq!(ToolType::from_name(tool.name()), Some(tool));
        }
        assert_eq!(ToolType::from_name("teleport"), None);
    }

    #[test]
    fn test_default_params() {
        assert_eq!(default_param_for("shell"), "command");
        assert_eq!(default_param_for("read-file"), "path");
        assert_eq!(default_param_for("write-file"), "path");
        assert_eq!(default_param_for("glob"), "pattern");
        assert_eq!(default_param_for("grep"), "pattern");
        assert_eq!(default_param_for("web-fetch"), "url");
        assert_eq!(default_param_for("wait-process"), "session_id");
        assert_eq!(default_param_for("custom-thing"), "content");
    }

    #[test]
    fn test_schema_required_keys_are_properties() {
        for tool in ToolType::ALL {
            let schema = tool.schema();
            assert_eq!(schema["type"], "object", "{tool}");
            if let Some(required) = schema["required"].as_array() {
                for key in required {
                    let key = key.as_str().unwrap();
                    assert!(schema["properties"].get(key).is_some(), "{tool}: {key}");
                }
            }
        }
    }

    #[test]
    fn test_examples_start_with_tool_name() {
        for tool in ToolType::ALL {
            assert!(tool.example().starts_with(&format!("/{}", tool.name())));
        }
    }
}
