//! Untyped tool parameters and validation helpers.

use serde_json::Value;

use crate::error::AgentError;

/// Parameters passed to a tool, in the order they were written.
pub type ToolParams = serde_json::Map<String, Value>;

/// Error type for tool parameter validation failures.
///
/// Messages are written for the model: they say what was wrong and how to fix it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterValidationError {
    /// A required parameter is missing.
    #[error("missing required parameter '{name}': {hint}")]
    MissingRequired {
        name: &'static str,
        hint: &'static str,
    },

    /// A parameter has an invalid type.
    #[error("invalid type for '{name}': expected {expected}, got {actual}")]
    InvalidType {
        name: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// A parameter value doesn't match an expected pattern or range.
    #[error("'{name}' has invalid value '{value}': {message}")]
    InvalidValue {
        name: &'static str,
        value: String,
        message: String,
    },
}

impl ParameterValidationError {
    /// Create a missing required parameter error.
    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::MissingRequired { name, hint }
    }

    /// Create an invalid type error.
    pub fn invalid_type(name: &'static str, expected: &'static str, actual: &Value) -> Self {
        Self::InvalidType {
            name,
            expected,
            actual: json_type_name(actual).to_string(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(
        name: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            message: message.into(),
        }
    }

    /// The parameter this error is about.
    pub fn parameter_name(&self) -> &str {
        match self {
            Self::MissingRequired { name, .. }
            | Self::InvalidType { name, .. }
            | Self::InvalidValue { name, .. } => name,
        }
    }
}

impl From<ParameterValidationError> for AgentError {
    fn from(err: ParameterValidationError) -> Self {
        AgentError::InvalidArguments(err.to_string())
    }
}

const NOT_AN_INTEGER: &str = "expected a non-negative integer";

/// Result type for parameter validation.
pub type ParamResult<T> = std::result::Result<T, ParameterValidationError>;

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Helper trait for extracting and validating parameters.
///
/// Values parsed out of `<devin>` blocks are always strings, so numeric and
/// boolean accessors also accept their string spellings.
pub trait ParamExt {
    /// Get a required, non-empty string parameter.
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str>;

    /// Get an optional string parameter.
    fn optional_str(&self, name: &str) -> Option<&str>;

    /// Get an optional u64 parameter.
    fn optional_u64(&self, name: &'static str) -> ParamResult<Option<u64>>;

    /// Get an optional boolean parameter with default.
    fn optional_bool(&self, name: &'static str, default: bool) -> ParamResult<bool>;
}

impl ParamExt for ToolParams {
    fn required_str(&self, name: &'static str, hint: &'static str) -> ParamResult<&str> {
        match self.get(name) {
            None | Some(Value::Null) => Err(ParameterValidationError::missing(name, hint)),
            Some(Value::String(s)) if s.trim().is_empty() => {
                Err(ParameterValidationError::missing(name, hint))
            }
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name, "string", other,
            )),
        }
    }

    fn optional_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    fn optional_u64(&self, name: &'static str) -> ParamResult<Option<u64>> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                ParameterValidationError::invalid_value(name, n.to_string(), NOT_AN_INTEGER)
            }),
            Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| {
                ParameterValidationError::invalid_value(name, s.clone(), NOT_AN_INTEGER)
            }),
            Some(other) => Err(ParameterValidationError::invalid_type(
                name, "integer", other,
            )),
        }
    }

    fn optional_bool(&self, name: &'static str, default: bool) -> ParamResult<bool> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ParameterValidationError::invalid_value(
                    name,
                    s.clone(),
                    "expected true or false",
                )),
            },
            Some(other) => Err(ParameterValidationError::invalid_type(
                name, "boolean", other,
            )),
        }
    }
}

/// Render a parameter value as plain text (strings unquoted).
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> ToolParams {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_required_str() {
        let p = params(json!({"path": "a.txt", "blank": "  ", "num": 3}));
        assert_eq!(p.required_str("path", "file path").unwrap(), "a.txt");

        let err = p.required_str("missing", "give a path").unwrap_err();
        assert_eq!(err.parameter_name(), "missing");
        assert!(err.to_string().contains("give a path"));

        assert!(matches!(
            p.required_str("blank", "x"),
            Err(ParameterValidationError::MissingRequired { .. })
        ));
        assert!(matches!(
            p.required_str("num", "x"),
            Err(ParameterValidationError::InvalidType { actual, .. }) if actual == "number"
        ));
    }

    #[test]
    fn test_optional_u64_accepts_strings() {
        let p = params(json!({"a": "42", "b": 7, "c": "-1", "d": true}));
        assert_eq!(p.optional_u64("a").unwrap(), Some(42));
        assert_eq!(p.optional_u64("b").unwrap(), Some(7));
        assert_eq!(p.optional_u64("none").unwrap(), None);
        assert!(p.optional_u64("c").is_err());
        assert!(p.optional_u64("d").is_err());
    }

    #[test]
    fn test_optional_bool() {
        let p = params(json!({"a": "true", "b": false, "c": "maybe"}));
        assert!(p.optional_bool("a", false).unwrap());
        assert!(!p.optional_bool("b", true).unwrap());
        assert!(p.optional_bool("none", true).unwrap());
        assert!(p.optional_bool("c", true).is_err());
    }

    #[test]
    fn test_into_agent_error() {
        let err: AgentError = ParameterValidationError::missing("path", "x").into();
        assert!(matches!(err, AgentError::InvalidArguments(_)));
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&json!(["a", 1])), "[\"a\",1]");
    }
}
