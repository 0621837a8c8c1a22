//! Response extraction paths.
//!
//! Custom agents describe where the reply text lives with a small JSONPath
//! subset: `$`, `.key`, `['key']`, `["key"]` and `[n]`. The path is parsed once
//! when the client is built and evaluated against every response or chunk.

use serde_json::Value;

use crate::error::{LlmError, Result};

/// Default path for streamed OpenAI-style chunks.
pub const DEFAULT_STREAM_PATH: &str = "$.choices[0].delta.content";

/// Default path for whole OpenAI-style responses.
pub const DEFAULT_JSON_PATH: &str = "$.choices[0].message.content";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed extraction path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePath {
    source: String,
    segments: Vec<Segment>,
}

impl ResponsePath {
    /// Parse a path such as `$.choices[0].delta.content`.
    pub fn parse(path: &str) -> Result<Self> {
        let source = path.trim();
        let rest = source
            .strip_prefix('$')
            .ok_or_else(|| invalid(source, "path must start with '$'"))?;

        let chars: Vec<char> = rest.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    if start == i {
                        return Err(invalid(source, "empty key after '.'"));
                    }
                    let key: String = chars[start..i].iter().collect();
                    if key == "*" {
                        return Err(invalid(source, "wildcards are not supported"));
                    }
                    segments.push(Segment::Key(key));
                }
                '[' => {
                    i += 1;
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| invalid(source, "unclosed '['"))?;
                    let inner: String = chars[i..close].iter().collect();
                    segments.push(parse_bracket(source, inner.trim())?);
                    i = close + 1;
                }
                other => {
                    return Err(invalid(
                        source,
                        &format!("unexpected character '{}'", other),
                    ));
                }
            }
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The path as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Resolve the path against a JSON value.
    pub fn evaluate<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(value, |current, segment| match segment {
                Segment::Key(key) => current.get(key.as_str()),
                Segment::Index(index) => current.get(*index),
            })
    }

    /// Resolve the path and render the result as reply text.
    ///
    /// Strings are returned as-is, arrays are joined with spaces, and other
    /// scalars are stringified. `null` and missing values yield `None`.
    pub fn extract_text(&self, value: &Value) -> Option<String> {
        match self.evaluate(value)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            other => Some(other.to_string()),
        }
    }
}

impl std::fmt::Display for ResponsePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_bracket(source: &str, inner: &str) -> Result<Segment> {
    if let Some(quoted) = inner
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
    {
        return Ok(Segment::Key(quoted.to_string()));
    }

    inner
        .parse::<usize>()
        .map(Segment::Index)
        .map_err(|_| invalid(source, &format!("unsupported selector '[{}]'", inner)))
}

fn invalid(path: &str, reason: &str) -> LlmError {
    LlmError::config(format!("invalid response format '{}': {}", path, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_delta_path() {
        let path = ResponsePath::parse(DEFAULT_STREAM_PATH).unwrap();
        let chunk = json!({"choices": [{"delta": {"content": "Hel"}}]});
        assert_eq!(path.extract_text(&chunk).as_deref(), Some("Hel"));
    }

    #[test]
    fn test_missing_value() {
        let path = ResponsePath::parse(DEFAULT_STREAM_PATH).unwrap();
        let chunk = json!({"choices": [{"delta": {"role": "assistant"}, "finish_reason": null}]});
        assert!(path.extract_text(&chunk).is_none());
        assert!(path.extract_text(&json!({"choices": []})).is_none());
    }

    #[test]
    fn test_null_value_is_none() {
        let path = ResponsePath::parse("$.content").unwrap();
        assert!(path.extract_text(&json!({"content": null})).is_none());
    }

    #[test]
    fn test_bracket_keys() {
        let path = ResponsePath::parse("$['data'][\"answer text\"]").unwrap();
        let body = json!({"data": {"answer text": "42"}});
        assert_eq!(path.extract_text(&body).as_deref(), Some("42"));
    }

    #[test]
    fn test_root_path() {
        let path = ResponsePath::parse("$").unwrap();
        assert_eq!(path.extract_text(&json!("whole")).as_deref(), Some("whole"));
    }

    #[test]
    fn test_array_result_is_joined() {
        let path = ResponsePath::parse("$.tokens").unwrap();
        let body = json!({"tokens": ["a", "b", 3]});
        assert_eq!(path.extract_text(&body).as_deref(), Some("a b 3"));
    }

    #[test]
    fn test_scalar_result_is_stringified() {
        let path = ResponsePath::parse("$.score").unwrap();
        assert_eq!(path.extract_text(&json!({"score": 0.5})).as_deref(), Some("0.5"));
        assert_eq!(
            path.extract_text(&json!({"score": true})).as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_invalid_paths() {
        for bad in ["choices[0]", "$.", "$[0", "$.a[*]", "$..content", "$.a[x]", "$ a"] {
            let err = ResponsePath::parse(bad).unwrap_err();
            assert!(matches!(err, LlmError::Config(_)), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_display_keeps_source() {
        let path = ResponsePath::parse(" $.output.text ").unwrap();
        assert_eq!(path.to_string(), "$.output.text");
    }
}
