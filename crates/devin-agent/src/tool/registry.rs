//! Name-based tool dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    ErrorKind, ProviderSet, Tool, ToolContext, ToolDependencies, ToolDescriptor, ToolParams,
    ToolResult,
};
use crate::error::AgentError;

/// Registry for managing available tools.
///
/// Built once at startup and read thereafter. Lookup is by exact name.
/// [`execute`](Self::execute) is the error boundary: whatever a tool does,
/// the caller gets a [`ToolResult`] back.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build a registry from providers.
    ///
    /// Providers are consulted in priority order; when two provide the same
    /// name, the higher-priority provider's tool is kept.
    pub fn from_providers(providers: &ProviderSet, deps: &ToolDependencies) -> Self {
        let mut registry = Self::new();
        for provider in providers.iter() {
            let tools = provider.provide(deps);
            tracing::debug!(
                provider = provider.name(),
                priority = provider.priority(),
                count = tools.len(),
                "Registering provider tools"
            );
            for tool in tools {
                if registry.contains(tool.name()) {
                    tracing::debug!(
                        tool = tool.name(),
                        provider = provider.name(),
                        "Tool already provided by a higher-priority provider"
                    );
                    continue;
                }
                registry.register_arc(tool);
            }
        }
        registry
    }

    /// Register a tool.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a tool from an Arc.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Remove a tool. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every tool, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.names()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDescriptor::of(tool.as_ref()))
            .collect()
    }

    /// Names of tools that need the file system.
    pub fn file_system_tools(&self) -> Vec<&str> {
        self.names_where(|t| t.requires_file_system())
    }

    /// Names of tools that run commands or modify files.
    pub fn execution_tools(&self) -> Vec<&str> {
        self.names_where(|t| t.is_execution_tool())
    }

    /// A copy without any execution tool.
    pub fn read_only_view(&self) -> ToolRegistry {
        self.filtered(|t| !t.is_execution_tool())
    }

    /// A copy without the named tools. Unknown names are ignored.
    pub fn without<S: AsRef<str>>(&self, names: &[S]) -> ToolRegistry {
        self.filtered(|t| !names.iter().any(|n| n.as_ref() == t.name()))
    }

    fn names_where(&self, predicate: impl Fn(&dyn Tool) -> bool) -> Vec<&str> {
        self.names()
            .into_iter()
            .filter(|name| self.tools.get(*name).is_some_and(|t| predicate(t.as_ref())))
            .collect()
    }

    fn filtered(&self, keep: impl Fn(&dyn Tool) -> bool) -> ToolRegistry {
        ToolRegistry {
            tools: self
                .tools
                .iter()
                .filter(|(_, tool)| keep(tool.as_ref()))
                .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
                .collect(),
        }
    }

    /// Execute a tool by name.
    ///
    /// Never fails: unknown tools, invalid arguments, tool errors and panics
    /// all come back as [`ToolResult::Error`]. The tool runs on its own task
    /// so a panic is contained there.
    pub async fn execute(&self, name: &str, params: ToolParams, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(name) else {
            tracing::debug!(tool = %name, "Unknown tool requested");
            return ToolResult::error(
                ErrorKind::UnknownTool,
                format!(
                    "Unknown tool '{}'. Available tools: {}",
                    name,
                    self.names().join(", ")
                ),
            );
        };

        tracing::debug!(tool = %name, params = params.len(), "Executing tool");
        let task_ctx = ctx.clone();
        let handle = tokio::spawn(async move { tool.execute(params, &task_ctx).await });

        let result = match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(AgentError::InvalidArguments(message))) => {
                ToolResult::error(ErrorKind::InvalidArguments, message)
            }
            Ok(Err(AgentError::ExecutionFailure { tool, cause })) => ToolResult::error(
                ErrorKind::ExecutionFailure,
                format!("{} failed: {}", tool, cause),
            ),
            Ok(Err(e)) => {
                tracing::warn!(tool = %name, error = %e, "Tool returned an error");
                ToolResult::error(ErrorKind::InternalError, e.to_string())
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "tool task was cancelled".to_string()
                };
                tracing::warn!(tool = %name, error = %message, "Tool panicked");
                ToolResult::error(
                    ErrorKind::InternalError,
                    format!("Tool '{}' crashed: {}", name, message),
                )
            }
        };

        tracing::debug!(
            tool = %name,
            success = result.is_success(),
            pending = result.is_pending(),
            "Tool finished"
        );
        result
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
