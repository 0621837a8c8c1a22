//! Core message types shared by every LLM client.
//!
//! The conversation is plain text end to end: tool results re-enter as
//! `User` messages, so there are no structured content blocks here.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

impl Role {
    /// Wire name used by OpenAI-style chat APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Optional author name (function name for `Function` messages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a function message attributed to `name`.
    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: content.into(),
            name: Some(name.into()),
        }
    }

    /// Attach an author name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true for the system message.
    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Accounting
// ─────────────────────────────────────────────────────────────────────────────

/// Token usage metadata for a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Tokens in the most recent prompt.
    pub input_tokens: u32,
    /// Tokens in the most recent completion.
    pub output_tokens: u32,
    /// Running total across the session.
    pub total_tokens: u32,
}

impl TokenInfo {
    /// Record usage from one request.
    pub fn record_usage(&mut self, input_tokens: u32, output_tokens: u32) {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self.total_tokens = self
            .total_tokens
            .saturating_add(input_tokens)
            .saturating_add(output_tokens);
    }

    /// Returns true if a backend has reported any usage.
    pub fn is_reported(&self) -> bool {
        self.total_tokens > 0
    }
}

/// Token counts a backend reported for a single request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    /// Read the `usage` object of a response body.
    ///
    /// Accepts OpenAI-style `prompt_tokens`/`completion_tokens` and
    /// `input_tokens`/`output_tokens` field names.
    pub fn from_response(value: &serde_json::Value) -> Option<Self> {
        let usage = value.get("usage")?.as_object()?;
        let count = |keys: [&str; 2]| {
            keys.iter()
                .find_map(|k| usage.get(*k).and_then(serde_json::Value::as_u64))
                .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        };
        let input_tokens = count(["prompt_tokens", "input_tokens"]);
        let output_tokens = count(["completion_tokens", "output_tokens"]);
        if input_tokens.is_none() && output_tokens.is_none() {
            return None;
        }
        Some(Self {
            input_tokens: input_tokens.unwrap_or_default(),
            output_tokens: output_tokens.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);

        let f = Message::function("glob", "[]");
        assert_eq!(f.role, Role::Function);
        assert_eq!(f.name.as_deref(), Some("glob"));
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let restored: Message =
            serde_json::from_value(serde_json::json!({"role": "function", "content": "x", "name": "grep"}))
                .unwrap();
        assert_eq!(restored, Message::function("grep", "x"));
    }

    #[test]
    fn test_token_info_accumulates() {
        let mut info = TokenInfo::default();
        assert!(!info.is_reported());

        info.record_usage(100, 20);
        info.record_usage(150, 30);
        assert_eq!(info.input_tokens, 150);
        assert_eq!(info.output_tokens, 30);
        assert_eq!(info.total_tokens, 300);
        assert!(info.is_reported());
    }

    #[test]
    fn test_usage_from_response() {
        let openai = serde_json::json!({
            "choices": [],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });
        assert_eq!(
            Usage::from_response(&openai),
            Some(Usage { input_tokens: 12, output_tokens: 3 })
        );

        let other = serde_json::json!({"usage": {"input_tokens": 7, "output_tokens": 2}});
        assert_eq!(
            Usage::from_response(&other),
            Some(Usage { input_tokens: 7, output_tokens: 2 })
        );

        assert_eq!(Usage::from_response(&serde_json::json!({"usage": null})), None);
        assert_eq!(Usage::from_response(&serde_json::json!({"usage": {}})), None);
        assert_eq!(Usage::from_response(&serde_json::json!({"text": "hi"})), None);
    }
}
