//! Wiring configuration into clients, tools and the agent loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use devin_agent::{
    AgentExecutor, BuiltinToolProvider, ClientSubAgents, ConversationManager, ExecutorConfig,
    ProviderSet, ShellConfig, SubAgentManager, ToolCallParser, ToolDependencies,
    ToolResultFormatter, ToolRegistry,
};
use devin_config::{CustomAgentToml, DevinConfig, ResponseActionKind};
use devin_llm::{AgentAuth, CustomAgentClient, CustomAgentConfig, ResponseAction, SharedClient};

use crate::host::{LocalFileSystem, ProcessShell};

const DEFAULT_SYSTEM_PROMPT: &str = "\
You are Devin, a coding agent working in the user's project directory.

Call tools by writing one or more commands inside a <devin> block:

<devin>
/read-file path=\"src/main.rs\"
</devin>

Tool results come back in the next message. Call tools until the task is \
done, then reply with a summary and no <devin> block.";

// ─────────────────────────────────────────────────────────────────────────────
// Clients
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime config for the `[agents.<name>]` section.
pub fn agent_config(name: &str, agent: &CustomAgentToml) -> Result<CustomAgentConfig> {
    let action = match agent.response_action {
        ResponseActionKind::Direct => ResponseAction::Direct,
        ResponseActionKind::Stream => ResponseAction::Stream,
        ResponseActionKind::TextChunk => ResponseAction::TextChunk,
        ResponseActionKind::WebView => ResponseAction::WebView,
        ResponseActionKind::DevIns => ResponseAction::DevIns,
        ResponseActionKind::Flow => ResponseAction::Flow,
    };

    let mut config = CustomAgentConfig::new(name, &agent.url)
        .with_response_action(action)
        .with_timeout(Duration::from_secs(agent.timeout));
    if let Some(template) = &agent.request_format {
        config = config.with_request_format(template);
    }
    if let Some(path) = &agent.response_format {
        config = config.with_response_format(path);
    }
    if let Some(auth) = &agent.auth {
        let Some(token) = auth.resolve_token() else {
            match &auth.token_env {
                Some(var) => bail!("Agent '{}' needs a token: set {}", name, var),
                None => bail!("Agent '{}' has auth configured but no token", name),
            }
        };
        config = config.with_auth(AgentAuth::bearer(token));
    }
    Ok(config)
}

/// Client for the named agent.
pub fn build_client(config: &DevinConfig, name: &str) -> Result<SharedClient> {
    let agent = config.custom_agent(name)?;
    let client = CustomAgentClient::new(agent_config(name, agent)?)?;
    Ok(Arc::new(client))
}

/// Every configured agent except `exclude`, for `ask-agent`.
pub fn sub_agents(config: &DevinConfig, exclude: &str) -> Result<ClientSubAgents> {
    let mut agents = ClientSubAgents::new();
    for name in config.agent_names() {
        if name == exclude {
            continue;
        }
        agents = agents.with_agent(name, build_client(config, name)?);
    }
    Ok(agents)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

pub fn compression_config(config: &DevinConfig) -> devin_agent::CompressionConfig {
    let c = config.compression();
    devin_agent::CompressionConfig {
        enabled: c.enabled,
        threshold: c.threshold,
        max_context_tokens: c.max_context_tokens,
        preserve_recent: c.preserve_recent,
    }
}

pub fn shell_config(config: &DevinConfig) -> ShellConfig {
    let tools = config.tools();
    ShellConfig {
        timeout: Duration::from_secs(tools.shell_timeout_secs),
        pending_after: tools.pending_after_secs.map(Duration::from_secs),
    }
}

/// The tools offered to the model, after `[tools] disabled` and read-only filtering.
pub fn build_registry(
    config: &DevinConfig,
    sub_agents: Option<Arc<dyn SubAgentManager>>,
    llm_service: Option<SharedClient>,
    read_only: bool,
) -> ToolRegistry {
    let mut deps = ToolDependencies::new(Arc::new(LocalFileSystem), Arc::new(ProcessShell));
    if let Some(agents) = sub_agents {
        deps = deps.with_sub_agents(agents);
    }
    if let Some(client) = llm_service {
        deps = deps.with_llm_service(client);
    }

    let providers = ProviderSet::new().with(BuiltinToolProvider::new(shell_config(config)));
    let disabled = config.tools().disabled;
    let registry = ToolRegistry::from_providers(&providers, &deps).without(&disabled[..]);
    if read_only || config.engine().read_only {
        registry.read_only_view()
    } else {
        registry
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Loop
// ─────────────────────────────────────────────────────────────────────────────

/// Options for one `devin run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub agent: String,
    pub working_dir: PathBuf,
    pub max_iterations: Option<u32>,
    pub read_only: bool,
}

/// System prompt: the configured or built-in preamble plus the tool list.
pub fn system_prompt(config: &DevinConfig, registry: &ToolRegistry) -> String {
    let preamble = config
        .engine()
        .system_prompt
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());
    format!(
        "{}\n\n# Tools\n\n{}",
        preamble,
        ToolResultFormatter::format_tool_list(&registry.descriptors())
    )
}

/// Build an executor for `options.agent` over the local host.
pub fn build_executor(config: &DevinConfig, options: &RunOptions) -> Result<AgentExecutor> {
    let client = build_client(config, &options.agent)?;
    let agents = sub_agents(config, &options.agent)?;
    let agents: Option<Arc<dyn SubAgentManager>> = if agents.is_empty() {
        None
    } else {
        Some(Arc::new(agents))
    };

    let registry = build_registry(config, agents, Some(client.clone()), options.read_only);
    let engine = config.engine();
    let manager = ConversationManager::new(
        client,
        system_prompt(config, &registry),
        compression_config(config),
        engine.plan_model,
    );

    tracing::info!(
        agent = %options.agent,
        tools = registry.len(),
        dir = %options.working_dir.display(),
        "Starting agent"
    );

    Ok(AgentExecutor::new(
        manager,
        Arc::new(registry),
        ToolCallParser::new(),
        ExecutorConfig {
            max_iterations: options.max_iterations.unwrap_or(engine.max_iterations),
            working_dir: absolute(&options.working_dir)?,
        },
    ))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        bail!("Working directory not found: {}", path.display());
    }
    Ok(std::path::absolute(path)?)
}
