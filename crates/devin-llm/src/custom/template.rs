//! Request body templating for custom agents.
//!
//! A request template is a JSON document with a `$content` placeholder where
//! the prompt goes. Two strategies are tried in order and only the first that
//! matches is applied:
//!
//! 1. the literal `"content":"$content"` shape used by chat-style bodies;
//! 2. any `:"$content"` JSON value, whatever its key or spacing.
//!
//! The prompt is JSON-escaped before insertion so the body stays valid JSON.

use regex::{NoExpand, Regex};
use std::sync::LazyLock;

/// Literal placeholder for the common chat message shape.
pub const LITERAL_PLACEHOLDER: &str = r#""content":"$content""#;

static VALUE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#":\s*"\$content""#).expect("placeholder regex is valid"));

/// Which substitution strategy produced a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substitution {
    /// Matched `"content":"$content"` literally.
    Literal,
    /// Matched a `:"$content"` value through the regex fallback.
    JsonValue,
}

/// Substitute `prompt` into `template`.
///
/// Returns `None` if the template has no placeholder either strategy accepts.
pub fn substitute_content(template: &str, prompt: &str) -> Option<String> {
    substitute_with_strategy(template, prompt).map(|(body, _)| body)
}

/// Like [`substitute_content`], also reporting which strategy matched.
pub fn substitute_with_strategy(template: &str, prompt: &str) -> Option<(String, Substitution)> {
    let quoted = json_quote(prompt);

    if template.contains(LITERAL_PLACEHOLDER) {
        let body = template.replace(LITERAL_PLACEHOLDER, &format!(r#""content":{}"#, quoted));
        return Some((body, Substitution::Literal));
    }

    if VALUE_PLACEHOLDER.is_match(template) {
        let replacement = format!(":{}", quoted);
        let body = VALUE_PLACEHOLDER
            .replace_all(template, NoExpand(&replacement))
            .into_owned();
        return Some((body, Substitution::JsonValue));
    }

    None
}

/// Encode `text` as a JSON string literal, quotes included.
fn json_quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}
