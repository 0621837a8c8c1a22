//! File tools: read, write, edit and list.

use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::tool::{
    ErrorKind, FileSystem, ParamExt, Tool, ToolCategory, ToolContext, ToolParams, ToolResult,
    ToolType,
};

/// Map an I/O failure on `path` to a tool result.
pub(crate) fn io_error(path: &Path, err: &io::Error) -> ToolResult {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::FileNotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::TimedOut => ErrorKind::Timeout,
        _ => ErrorKind::ExecutionFailure,
    };
    ToolResult::error(kind, format!("{}: {}", path.display(), err))
}

fn cancelled() -> ToolResult {
    ToolResult::error(ErrorKind::ExecutionFailure, "Operation cancelled")
}

macro_rules! catalog_metadata {
    ($tool:expr) => {
        fn name(&self) -> &str {
            $tool.name()
        }

        fn description(&self) -> &str {
            $tool.description()
        }

        fn parameters(&self) -> Value {
            $tool.schema()
        }

        fn category(&self) -> ToolCategory {
            $tool.category()
        }

        fn examples(&self) -> Vec<String> {
            vec![$tool.example().to_string()]
        }
    };
}
pub(crate) use catalog_metadata;

// ─────────────────────────────────────────────────────────────────────────────
// Read File
// ─────────────────────────────────────────────────────────────────────────────

/// Reads a file, optionally a line range.
pub struct ReadFileTool {
    fs: Arc<dyn FileSystem>,
}

impl ReadFileTool {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    catalog_metadata!(ToolType::ReadFile);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(cancelled());
        }

        let raw_path = params.required_str("path", "the file to read, relative to the project")?;
        let start = params.optional_u64("start_line")?;
        let end = params.optional_u64("end_line")?;
        let path = self.fs.resolve_path(ctx.working_dir(), raw_path);

        let content = match self.fs.read_file(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(io_error(&path, &e)),
        };

        let total_lines = content.lines().count();
        let content = match (start, end) {
            (None, None) => content,
            (start, end) => {
                let start = start.unwrap_or(1).max(1) as usize;
                let end = end.map(|e| e as usize).unwrap_or(total_lines);
                if start > end {
                    return Ok(ToolResult::error(
                        ErrorKind::InvalidArguments,
                        format!("start_line {} is after end_line {}", start, end),
                    ));
                }
                content
                    .lines()
                    .skip(start - 1)
                    .take(end + 1 - start)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };

        Ok(ToolResult::success(content)
            .with_metadata("path", path.display())
            .with_metadata("lines", total_lines))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Write File
// ─────────────────────────────────────────────────────────────────────────────

/// Creates or overwrites a file.
pub struct WriteFileTool {
    fs: Arc<dyn FileSystem>,
}

impl WriteFileTool {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    catalog_metadata!(ToolType::WriteFile);

    fn is_execution_tool(&self) -> bool {
        true
    }

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(cancelled());
        }

        let raw_path = params.required_str("path", "the file to write")?;
        let content = params.optional_str("content").ok_or_else(|| {
            crate::tool::ParameterValidationError::missing(
                "content",
                "put the file body in a fenced code block after the command",
            )
        })?;
        let path = self.fs.resolve_path(ctx.working_dir(), raw_path);
        let existed = self.fs.exists(&path).await;

        if let Err(e) = self.fs.write_file(&path, content).await {
            return Ok(io_error(&path, &e));
        }

        let verb = if existed { "Updated" } else { "Created" };
        Ok(
            ToolResult::success(format!("{} {} ({} bytes)", verb, path.display(), content.len()))
                .with_metadata("bytes", content.len()),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Edit File
// ─────────────────────────────────────────────────────────────────────────────

/// Replaces one exact occurrence of a snippet.
pub struct EditFileTool {
    fs: Arc<dyn FileSystem>,
}

impl EditFileTool {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    catalog_metadata!(ToolType::EditFile);

    fn is_execution_tool(&self) -> bool {
        true
    }

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(cancelled());
        }

        let raw_path = params.required_str("path", "the file to edit")?;
        let old_text = params.required_str("old_text", "the exact text to replace")?;
        let new_text = params.optional_str("new_text").unwrap_or_default();
        let path = self.fs.resolve_path(ctx.working_dir(), raw_path);

        let content = match self.fs.read_file(&path).await {
            Ok(content) => content,
            Err(e) => return Ok(io_error(&path, &e)),
        };

        match content.matches(old_text).count() {
            0 => {
                return Ok(ToolResult::error(
                    ErrorKind::InvalidArguments,
                    format!("old_text not found in {}", path.display()),
                ));
            }
            1 => {}
            n => {
                return Ok(ToolResult::error(
                    ErrorKind::InvalidArguments,
                    format!(
                        "old_text occurs {} times in {}; include more context so it is unique",
                        n,
                        path.display()
                    ),
                ));
            }
        }

        let updated = content.replacen(old_text, new_text, 1);
        if let Err(e) = self.fs.write_file(&path, &updated).await {
            return Ok(io_error(&path, &e));
        }

        Ok(ToolResult::success(format!("Edited {}", path.display())))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// List Files
// ─────────────────────────────────────────────────────────────────────────────

/// Lists files in a directory.
pub struct ListFilesTool {
    fs: Arc<dyn FileSystem>,
    max_entries: usize,
}

impl ListFilesTool {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            max_entries: 500,
        }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    catalog_metadata!(ToolType::ListFiles);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        if ctx.is_cancelled() {
            return Ok(cancelled());
        }

        let raw_path = params.optional_str("path").unwrap_or(".");
        let recursive = params.optional_bool("recursive", false)?;
        let dir = self.fs.resolve_path(ctx.working_dir(), raw_path);

        let mut files = match self.fs.list_files(&dir, recursive).await {
            Ok(files) => files,
            Err(e) => return Ok(io_error(&dir, &e)),
        };
        files.sort();

        let total = files.len();
        let mut lines: Vec<String> = files
            .iter()
            .take(self.max_entries)
            .map(|p| p.strip_prefix(&dir).unwrap_or(p).display().to_string())
            .collect();
        if total > self.max_entries {
            lines.push(format!("... and {} more", total - self.max_entries));
        }

        Ok(ToolResult::success(lines.join("\n")).with_metadata("count", total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::deps::MemoryFileSystem;
    use serde_json::json;

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    fn fs() -> Arc<MemoryFileSystem> {
        Arc::new(
            MemoryFileSystem::new()
                .with_file("/work/a.txt", "one\ntwo\nthree\nfour")
                .with_file("/work/src/lib.rs", "pub fn x() {}\n")
                .with_file("/work/src/bin/main.rs", "fn main() {}\n"),
        )
    }

    fn ctx() -> ToolContext {
        ToolContext::new("/work")
    }

    #[tokio::test]
    async fn test_read_file() {
        let tool = ReadFileTool::new(fs());
        let result = tool.execute(params(json!({"path": "a.txt"})), &ctx()).await.unwrap();
        assert_eq!(result.to_llm_content(), "one\ntwo\nthree\nfour");
    }

    #[tokio::test]
    async fn test_read_file_line_range() {
        let tool = ReadFileTool::new(fs());
        let result = tool
            .execute(
                params(json!({"path": "a.txt", "start_line": "2", "end_line": "3"})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(result.to_llm_content(), "two\nthree");

        let bad = tool
            .execute(
                params(json!({"path": "a.txt", "start_line": "3", "end_line": "1"})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(bad.error_kind(), Some(ErrorKind::InvalidArguments));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let tool = ReadFileTool::new(fs());
        let result = tool.execute(params(json!({"path": "nope.txt"})), &ctx()).await.unwrap();
        assert_eq!(result.error_kind(), Some(ErrorKind::FileNotFound));
    }

    #[tokio::test]
    async fn test_read_missing_param_is_invalid_arguments() {
        let tool = ReadFileTool::new(fs());
        let err = tool.execute(ToolParams::new(), &ctx()).await.unwrap_err();
        assert!(matches!(err, crate::error::AgentError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_write_file() {
        let memory = fs();
        let tool = WriteFileTool::new(memory.clone());
        assert!(tool.is_execution_tool());

        let result = tool
            .execute(params(json!({"path": "test.txt", "content": "Hello World"})), &ctx())
            .await
            .unwrap();
        assert!(result.to_llm_content().starts_with("Created"));
        assert_eq!(memory.get("/work/test.txt").as_deref(), Some("Hello World"));

        let again = tool
            .execute(params(json!({"path": "test.txt", "content": "v2"})), &ctx())
            .await
            .unwrap();
        assert!(again.to_llm_content().starts_with("Updated"));
    }

    #[tokio::test]
    async fn test_write_file_requires_content() {
        let tool = WriteFileTool::new(fs());
        assert!(tool.execute(params(json!({"path": "x"})), &ctx()).await.is_err());
    }

    #[tokio::test]
    async fn test_edit_file() {
        let memory = fs();
        let tool = EditFileTool::new(memory.clone());
        let result = tool
            .execute(
                params(json!({"path": "a.txt", "old_text": "two", "new_text": "2"})),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(memory.get("/work/a.txt").as_deref(), Some("one\n2\nthree\nfour"));
    }

    #[tokio::test]
    async fn test_edit_file_ambiguous_or_missing() {
        let memory = Arc::new(MemoryFileSystem::new().with_file("/work/b.txt", "x x"));
        let tool = EditFileTool::new(memory);
        let ambiguous = tool
            .execute(params(json!({"path": "b.txt", "old_text": "x", "new_text": "y"})), &ctx())
            .await
            .unwrap();
        assert!(ambiguous.to_llm_content().contains("2 times"));

        let missing = tool
            .execute(params(json!({"path": "b.txt", "old_text": "z", "new_text": "y"})), &ctx())
            .await
            .unwrap();
        assert_eq!(missing.error_kind(), Some(ErrorKind::InvalidArguments));
    }

    #[tokio::test]
    async fn test_list_files() {
        let tool = ListFilesTool::new(fs());
        let flat = tool.execute(params(json!({"path": "src"})), &ctx()).await.unwrap();
        assert_eq!(flat.to_llm_content(), "lib.rs");

        let deep = tool
            .execute(params(json!({"path": "src", "recursive": "true"})), &ctx())
            .await
            .unwrap();
        assert_eq!(deep.to_llm_content(), "bin/main.rs\nlib.rs");
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let tool = ReadFileTool::new(fs());
        let ctx = ctx();
        ctx.cancellation.cancel();
        let result = tool.execute(params(json!({"path": "a.txt"})), &ctx).await.unwrap();
        assert!(result.is_error());
    }
}
