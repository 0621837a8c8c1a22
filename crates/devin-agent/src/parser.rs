//! Tool-call parsing.
//!
//! Tool calls are only recognized inside `<devin>` ... `</devin>` blocks.
//! Prose outside a block is never scanned, so paths like `/api/{id}` in an
//! explanation cannot turn into calls.
//!
//! Inside a block, each line of the form
//!
//! ~~~text
//! /tool-name key="value" other="say ""hi"""
//! ~~~
//!
//! is one invocation. A fenced code block or a JSON object directly after the
//! line becomes the invocation's body:
//!
//! ~~~text
//! <devin>
//! /write-file path="hello.txt"
//! ```
//! Hello World
//! ```
//! </devin>
//! ~~~

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::AgentError;
use crate::tool::{ToolParams, default_param_for};

/// Opening marker of a tool block.
pub const BLOCK_START: &str = "<devin>";
/// Closing marker of a tool block.
pub const BLOCK_END: &str = "</devin>";

static INVOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/([A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*)(?:\s+(.*))?$").expect("valid regex")
});

// ─────────────────────────────────────────────────────────────────────────────
// Blocks
// ─────────────────────────────────────────────────────────────────────────────

/// The inside of one `<devin>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevinBlock {
    /// Text between the markers.
    pub content: String,
    /// Byte offset of the opening marker.
    pub start: usize,
    /// Byte offset just past the closing marker.
    pub end: usize,
}

/// Find every terminated `<devin>` block in `text`, in document order.
///
/// A block whose end marker is missing, or that is interrupted by another
/// opening marker, is skipped with a warning.
pub fn extract_devin_blocks(text: &str) -> Vec<DevinBlock> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(BLOCK_START) {
        let start = pos + offset;
        let content_start = start + BLOCK_START.len();
        let next_end = text[content_start..].find(BLOCK_END);
        let next_start = text[content_start..].find(BLOCK_START);

        match (next_end, next_start) {
            (Some(e), Some(s)) if s < e => {
                warn_malformed(start, "block is interrupted by another <devin> marker");
                pos = content_start + s;
            }
            (Some(e), _) => {
                let content_end = content_start + e;
                let end = content_end + BLOCK_END.len();
                blocks.push(DevinBlock {
                    content: text[content_start..content_end].to_string(),
                    start,
                    end,
                });
                pos = end;
            }
            (None, _) => {
                warn_malformed(start, "missing </devin>");
                break;
            }
        }
    }

    blocks
}

fn warn_malformed(offset: usize, reason: &str) {
    let error = AgentError::ParseMalformedBlock(format!("at byte {}: {}", offset, reason));
    tracing::warn!(error = %error, "Skipping tool block");
}

// ─────────────────────────────────────────────────────────────────────────────
// Invocations
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub params: ToolParams,
    /// The invocation line plus any body attached to it.
    pub raw_span: String,
}

/// Parser for tool calls in model output.
#[derive(Debug, Clone, Default)]
pub struct ToolCallParser;

impl ToolCallParser {
    pub fn new() -> Self {
        Self
    }

    /// Every invocation in `text`, in document order.
    pub fn parse_tool_calls(&self, text: &str) -> Vec<ToolInvocation> {
        let blocks = extract_devin_blocks(text);
        let calls: Vec<ToolInvocation> = blocks
            .iter()
            .flat_map(|block| parse_block(&block.content))
            .collect();
        if !blocks.is_empty() {
            tracing::debug!(blocks = blocks.len(), invocations = calls.len(), "Parsed tool blocks");
        }
        calls
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with("//") || line.starts_with('#') || line.starts_with("<!--")
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn invocation_name(line: &str) -> Option<(String, String)> {
    let caps = INVOCATION.captures(line.trim())?;
    let name = caps.get(1)?.as_str().to_string();
    let rest = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
    Some((name, rest))
}

/// A body attached to an invocation: its text and the index of its last line.
struct Body {
    text: String,
    last_line: usize,
}

fn parse_block(content: &str) -> Vec<ToolInvocation> {
    let lines: Vec<&str> = content.lines().collect();
    let mut invocations = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            i += 1;
            continue;
        }
        let Some((tool_name, rest)) = invocation_name(trimmed) else {
            tracing::trace!(line = %trimmed, "Ignoring non-invocation line in tool block");
            i += 1;
            continue;
        };

        let mut params = parse_arguments(&tool_name, &rest);
        let explicit_content = params.contains_key("content");
        let mut last_line = i;

        if let Some(body) = fenced_body(&lines, i + 1).or_else(|| json_body(&lines, i + 1)) {
            last_line = body.last_line;
            attach_body(&mut params, body.text, explicit_content);
        } else if tool_name == "write-file" && !explicit_content {
            let end = lines[i + 1..]
                .iter()
                .position(|l| invocation_name(l).is_some())
                .map(|p| i + 1 + p)
                .unwrap_or(lines.len());
            let text = lines[i + 1..end].join("\n").trim_matches('\n').to_string();
            if !text.trim().is_empty() {
                params.insert("content".into(), Value::String(text));
                last_line = end - 1;
            }
        }

        invocations.push(ToolInvocation {
            tool_name,
            params,
            raw_span: lines[i..=last_line].join("\n"),
        });
        i = last_line + 1;
    }

    invocations
}

fn attach_body(params: &mut ToolParams, text: String, explicit_content: bool) {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&text) {
        params.extend(fields);
        return;
    }
    if !explicit_content {
        params.insert("content".into(), Value::String(text));
    }
}

/// A fenced region starting at `from`. An unclosed fence runs to the end of the block.
fn fenced_body(lines: &[&str], from: usize) -> Option<Body> {
    let first = lines.get(from)?;
    if !is_fence(first) {
        return None;
    }
    let close = lines[from + 1..]
        .iter()
        .position(|l| l.trim() == "```")
        .map(|p| from + 1 + p);
    let (body_end, last_line) = match close {
        Some(c) => (c, c),
        None => (lines.len(), lines.len() - 1),
    };
    Some(Body {
        text: lines[from + 1..body_end].join("\n"),
        last_line,
    })
}

/// A JSON object starting at `from`, possibly spanning several lines.
fn json_body(lines: &[&str], from: usize) -> Option<Body> {
    if !lines.get(from)?.trim_start().starts_with('{') {
        return None;
    }
    let mut text = String::new();
    for (idx, line) in lines.iter().enumerate().skip(from) {
        if idx > from {
            text.push('\n');
        }
        text.push_str(line);
        if line.trim_end().ends_with('}')
            && serde_json::from_str::<serde_json::Map<String, Value>>(&text).is_ok()
        {
            return Some(Body {
                text,
                last_line: idx,
            });
        }
    }
    None
}

/// Parse `key="value"` pairs. A line with no pairs is the tool's default parameter.
fn parse_arguments(tool_name: &str, rest: &str) -> ToolParams {
    let mut params = ToolParams::new();
    let rest = rest.trim();
    if rest.is_empty() {
        return params;
    }
    if !rest.contains("=\"") {
        params.insert(
            default_param_for(tool_name).to_string(),
            Value::String(rest.to_string()),
        );
        return params;
    }

    let chars: Vec<char> = rest.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let key_start = i;
        while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-')
        {
            i += 1;
        }
        let key: String = chars[key_start..i].iter().collect();

        if key.is_empty() || chars.get(i) != Some(&'=') || chars.get(i + 1) != Some(&'"') {
            // Not a pair: skip to the next whitespace.
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            continue;
        }

        i += 2;
        let mut value = String::new();
        while i < chars.len() {
            if chars[i] == '"' {
                if chars.get(i + 1) == Some(&'"') {
                    value.push('"');
                    i += 2;
                    continue;
                }
                i += 1;
                break;
            }
            value.push(chars[i]);
            i += 1;
        }
        params.insert(key, Value::String(value));
    }

    params
}
