//! File search tools.
//!
//! Provides tools for searching files by path pattern and by content.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::file::{catalog_metadata, io_error};
use crate::error::Result;
use crate::tool::{
    ErrorKind, FileSystem, ParamExt, Tool, ToolCategory, ToolContext, ToolParams, ToolResult,
    ToolType,
};

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

const GLOB_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn compile_glob(pattern: &str) -> std::result::Result<glob::Pattern, ToolResult> {
    glob::Pattern::new(pattern).map_err(|e| {
        ToolResult::error(
            ErrorKind::InvalidArguments,
            format!("Invalid glob pattern '{}': {}", pattern, e),
        )
    })
}

async fn list_under(
    fs: &dyn FileSystem,
    ctx: &ToolContext,
    params: &ToolParams,
) -> std::result::Result<(PathBuf, Vec<PathBuf>), ToolResult> {
    let dir = fs.resolve_path(ctx.working_dir(), params.optional_str("path").unwrap_or("."));
    match fs.list_files(&dir, true).await {
        Ok(mut files) => {
            files.sort();
            Ok((dir, files))
        }
        Err(e) => Err(io_error(&dir, &e)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Glob Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for finding files matching glob patterns.
pub struct GlobTool {
    fs: Arc<dyn FileSystem>,
    max_results: usize,
}

impl GlobTool {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            max_results: 1000,
        }
    }
}

#[async_trait]
impl Tool for GlobTool {
    catalog_metadata!(ToolType::Glob);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        let pattern = params.required_str("pattern", "a glob such as **/*.rs")?;
        let matcher = match compile_glob(pattern) {
            Ok(m) => m,
            Err(result) => return Ok(result),
        };
        let (dir, files) = match list_under(self.fs.as_ref(), ctx, &params).await {
            Ok(listing) => listing,
            Err(result) => return Ok(result),
        };

        let matches: Vec<String> = files
            .iter()
            .map(|p| relative(p, &dir))
            .filter(|rel| matcher.matches_with(rel, GLOB_OPTIONS))
            .take(self.max_results)
            .collect();

        if matches.is_empty() {
            return Ok(ToolResult::success(format!("No files match '{}'", pattern))
                .with_metadata("count", 0));
        }

        let count = matches.len();
        Ok(ToolResult::success(matches.join("\n")).with_metadata("count", count))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Grep Tool
// ─────────────────────────────────────────────────────────────────────────────

/// Tool for searching file contents with a regex.
pub struct GrepTool {
    fs: Arc<dyn FileSystem>,
    max_matches: usize,
    max_line_len: usize,
}

impl GrepTool {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            max_matches: 200,
            max_line_len: 300,
        }
    }
}

#[async_trait]
impl Tool for GrepTool {
    catalog_metadata!(ToolType::Grep);

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        let pattern = params.required_str("pattern", "a regular expression to search for")?;
        let case_insensitive = params.optional_bool("case_insensitive", false)?;
        let regex = match RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
        {
            Ok(r) => r,
            Err(e) => {
                return Ok(ToolResult::error(
                    ErrorKind::InvalidArguments,
                    format!("Invalid regex '{}': {}", pattern, e),
                ));
            }
        };
        let file_filter = match params.optional_str("glob").map(compile_glob).transpose() {
            Ok(f) => f,
            Err(result) => return Ok(result),
        };

        let (dir, files) = match list_under(self.fs.as_ref(), ctx, &params).await {
            Ok(listing) => listing,
            Err(result) => return Ok(result),
        };

        let mut matches = Vec::new();
        let mut truncated = false;
        'files: for path in &files {
            if ctx.is_cancelled() {
                break;
            }
            let rel = relative(path, &dir);
            if let Some(filter) = &file_filter
                && !filter.matches_with(&rel, GLOB_OPTIONS)
            {
                continue;
            }
            // Unreadable or binary files are skipped.
            let Ok(content) = self.fs.read_file(path).await else {
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    if matches.len() >= self.max_matches {
                        truncated = true;
                        break 'files;
                    }
                    let shown: String = line.trim().chars().take(self.max_line_len).collect();
                    matches.push(format!("{}:{}: {}", rel, idx + 1, shown));
                }
            }
        }

        if matches.is_empty() {
            return Ok(ToolResult::success(format!("No matches for '{}'", pattern))
                .with_metadata("count", 0));
        }

        let count = matches.len();
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n[truncated after {} matches]", self.max_matches));
        }
        Ok(ToolResult::success(output).with_metadata("count", count))
    }
}
