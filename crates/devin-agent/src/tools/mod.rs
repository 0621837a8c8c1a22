//! Built-in tool implementations.
//!
//! Every tool here works through the capabilities in
//! [`ToolDependencies`], so the same set runs against the host or against
//! in-memory doubles in tests.

mod agent;
mod file;
mod process;
mod search;
mod shell;
mod web;

use std::sync::Arc;

use crate::tool::{Tool, ToolDependencies, ToolProvider};

pub use agent::AskAgentTool;
pub use file::{EditFileTool, ListFilesTool, ReadFileTool, WriteFileTool};
pub use process::{ReadProcessTool, WaitProcessTool};
pub use search::{GlobTool, GrepTool};
pub use shell::{ShellConfig, ShellTool};
pub use web::{WebFetchTool, html_to_text};

/// Provides the built-in tools.
///
/// `ask-agent` is only included when sub-agents are configured.
#[derive(Debug, Clone, Default)]
pub struct BuiltinToolProvider {
    shell: ShellConfig,
}

impl BuiltinToolProvider {
    pub fn new(shell: ShellConfig) -> Self {
        Self { shell }
    }
}

impl ToolProvider for BuiltinToolProvider {
    fn name(&self) -> &str {
        "builtin"
    }

    fn provide(&self, deps: &ToolDependencies) -> Vec<Arc<dyn Tool>> {
        let fs = &deps.file_system;
        let mut tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ReadFileTool::new(fs.clone())),
            Arc::new(WriteFileTool::new(fs.clone())),
            Arc::new(EditFileTool::new(fs.clone())),
            Arc::new(ListFilesTool::new(fs.clone())),
            Arc::new(GlobTool::new(fs.clone())),
            Arc::new(GrepTool::new(fs.clone())),
            Arc::new(ShellTool::new(deps.shell.clone(), self.shell.clone())),
            Arc::new(ReadProcessTool::new()),
            Arc::new(WaitProcessTool::new()),
            Arc::new(WebFetchTool::new(deps.llm_service.clone())),
        ];
        if let Some(agents) = &deps.sub_agents {
            tools.push(Arc::new(AskAgentTool::new(agents.clone())));
        }
        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::deps::{MemoryFileSystem, ScriptedShell};
    use crate::tool::{ClientSubAgents, ProviderSet, ToolRegistry, ToolType};
    use devin_llm::MockClient;

    fn deps() -> ToolDependencies {
        ToolDependencies::new(
            Arc::new(MemoryFileSystem::new()),
            Arc::new(ScriptedShell::default()),
        )
    }

    #[test]
    fn test_builtin_tools_match_catalog() {
        let registry =
            ToolRegistry::from_providers(&ProviderSet::new().with(BuiltinToolProvider::default()), &deps());
        let expected: Vec<&str> = ToolType::ALL
            .iter()
            .filter(|t| **t != ToolType::AskAgent)
            .map(|t| t.name())
            .collect();
        for name in &expected {
            assert!(registry.contains(name), "missing {}", name);
        }
        assert!(!registry.contains("ask-agent"));
        assert_eq!(registry.len(), expected.len());
    }

    #[test]
    fn test_ask_agent_with_sub_agents() {
        let agents = ClientSubAgents::new().with_agent("helper", Arc::new(MockClient::with_text("hi")));
        let deps = deps().with_sub_agents(Arc::new(agents));
        let tools = BuiltinToolProvider::default().provide(&deps);
        assert!(tools.iter().any(|t| t.name() == "ask-agent"));
    }

    #[test]
    fn test_read_only_view_hides_mutating_tools() {
        let registry =
            ToolRegistry::from_providers(&ProviderSet::new().with(BuiltinToolProvider::default()), &deps());
        let view = registry.read_only_view();
        assert!(view.contains("read-file"));
        assert!(view.contains("grep"));
        assert!(!view.contains("shell"));
        assert!(!view.contains("wait-process"));
        assert!(!view.contains("write-file"));
        assert!(!view.contains("edit-file"));
    }
}
