//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [engine]              # agent loop settings
//! [compression]         # context window budget
//! [tools]               # tool execution settings
//! [agents.my-agent]     # declarative custom HTTP agents
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevinConfig {
    /// Agent loop settings.
    pub engine: Option<EngineConfig>,

    /// Context compression settings.
    pub compression: Option<CompressionConfig>,

    /// Tool execution settings.
    pub tools: Option<ToolsConfig>,

    /// Custom HTTP agents by name.
    pub agents: BTreeMap<String, CustomAgentToml>,
}

impl DevinConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole; agents are merged by name.
    pub fn merge(&mut self, other: DevinConfig) {
        if other.engine.is_some() {
            self.engine = other.engine;
        }

        if other.compression.is_some() {
            self.compression = other.compression;
        }

        if other.tools.is_some() {
            self.tools = other.tools;
        }

        for (name, agent) in other.agents {
            self.agents.insert(name, agent);
        }
    }

    /// Effective engine settings.
    pub fn engine(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_default()
    }

    /// Effective compression settings.
    pub fn compression(&self) -> CompressionConfig {
        self.compression.clone().unwrap_or_default()
    }

    /// Effective tool settings.
    pub fn tools(&self) -> ToolsConfig {
        self.tools.clone().unwrap_or_default()
    }

    /// Look up a custom agent by name.
    pub fn custom_agent(&self, name: &str) -> Result<&CustomAgentToml> {
        self.agents
            .get(name)
            .ok_or_else(|| ConfigError::AgentNotFound(name.to_string()))
    }

    /// Names of all configured custom agents, sorted.
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let compression = self.compression();
        if !(compression.threshold > 0.0 && compression.threshold <= 1.0) {
            return Err(ConfigError::invalid(
                "compression.threshold",
                format!("must be in (0, 1], got {}", compression.threshold),
            ));
        }
        if compression.max_context_tokens == 0 {
            return Err(ConfigError::invalid(
                "compression.max_context_tokens",
                "must be greater than zero",
            ));
        }
        if self.engine().max_iterations == 0 {
            return Err(ConfigError::invalid(
                "engine.max_iterations",
                "must be greater than zero",
            ));
        }
        for (name, agent) in &self.agents {
            if agent.url.trim().is_empty() {
                return Err(ConfigError::missing("url", format!("[agents.{}]", name)));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Agent loop settings.
///
/// ```toml
/// [engine]
/// max_iterations = 100
/// plan_model = true
/// read_only = false
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard cap on model round-trips per task.
    pub max_iterations: u32,
    /// Replaces the built-in system prompt.
    pub system_prompt: Option<String>,
    /// The backend has a separate planning model.
    pub plan_model: bool,
    /// Hide tools that write files or execute commands.
    pub read_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            system_prompt: None,
            plan_model: false,
            read_only: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compression Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Context window budget.
///
/// ```toml
/// [compression]
/// threshold = 0.7
/// max_context_tokens = 128000
/// preserve_recent = 4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Compress automatically before sending a message.
    pub enabled: bool,
    /// Fraction of the context window that triggers compression.
    pub threshold: f32,
    /// Model context window in tokens.
    pub max_context_tokens: usize,
    /// Recent messages kept verbatim when compressing.
    pub preserve_recent: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.7,
            max_context_tokens: 128_000,
            preserve_recent: 4,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tool execution settings.
///
/// ```toml
/// [tools]
/// shell_timeout_secs = 60
/// pending_after_secs = 20
/// disabled = ["web-fetch"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Timeout for shell commands that run to completion.
    pub shell_timeout_secs: u64,
    /// Shell commands still running after this long become pending sessions.
    pub pending_after_secs: Option<u64>,
    /// Tool names never exposed to the model.
    pub disabled: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: 60,
            pending_after_secs: None,
            disabled: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Custom Agents
// ─────────────────────────────────────────────────────────────────────────────

/// Authentication scheme for a custom agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthScheme {
    #[serde(alias = "bearer")]
    Bearer,
}

/// Credentials for a custom agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAuthToml {
    /// Scheme.
    #[serde(rename = "type")]
    pub auth_type: AuthScheme,
    /// Token stored in the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Environment variable holding the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

impl AgentAuthToml {
    /// Resolve the token: environment variable first, then the config value.
    pub fn resolve_token(&self) -> Option<String> {
        self.token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.is_empty())
            .or_else(|| self.token.clone())
    }
}

/// How a custom agent's response is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseActionKind {
    #[default]
    #[serde(alias = "direct")]
    Direct,
    #[serde(alias = "stream")]
    Stream,
    #[serde(alias = "text_chunk", alias = "textchunk")]
    TextChunk,
    #[serde(alias = "webview", alias = "web_view")]
    WebView,
    #[serde(alias = "devins")]
    DevIns,
    #[serde(alias = "flow")]
    Flow,
}

/// One `[agents.<name>]` section.
///
/// ```toml
/// [agents.reviewer]
/// url = "https://agents.example.com/v1/chat"
/// auth = { type = "Bearer", token_env = "REVIEWER_TOKEN" }
/// request_format = '{"messages":[{"role":"user","content":"$content"}]}'
/// response_format = "$.choices[0].delta.content"
/// response_action = "Stream"
/// timeout = 60
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAgentToml {
    /// Endpoint to POST to.
    pub url: String,
    /// Optional credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AgentAuthToml>,
    /// Request body template with a `$content` placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_format: Option<String>,
    /// JSONPath locating the reply text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    /// Delivery mode.
    #[serde(default)]
    pub response_action: ResponseActionKind,
    /// Request timeout in seconds.
    #[serde(default = "default_agent_timeout")]
    pub timeout: u64,
}

fn default_agent_timeout() -> u64 {
    60
}

impl CustomAgentToml {
    /// Returns true if a token is written directly in the config file.
    pub fn has_plaintext_token(&self) -> bool {
        self.auth
            .as_ref()
            .and_then(|a| a.token.as_ref())
            .is_some_and(|t| !t.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
