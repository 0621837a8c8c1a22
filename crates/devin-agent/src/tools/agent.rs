//! Sub-agent consultation tool.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{AgentError, Result};
use crate::tool::{
    ErrorKind, ParamExt, SubAgentManager, Tool, ToolCategory, ToolContext, ToolParams, ToolResult,
    ToolType,
};

/// Forwards a question to a named agent.
pub struct AskAgentTool {
    agents: Arc<dyn SubAgentManager>,
    description: String,
}

impl AskAgentTool {
    pub fn new(agents: Arc<dyn SubAgentManager>) -> Self {
        let names = agents.names();
        let description = if names.is_empty() {
            ToolType::AskAgent.description().to_string()
        } else {
            format!(
                "{} Available agents: {}.",
                ToolType::AskAgent.description(),
                names.join(", ")
            )
        };
        Self {
            agents,
            description,
        }
    }
}

#[async_trait]
impl Tool for AskAgentTool {
    fn name(&self) -> &str {
        ToolType::AskAgent.name()
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        ToolType::AskAgent.schema()
    }

    fn category(&self) -> ToolCategory {
        ToolType::AskAgent.category()
    }

    fn examples(&self) -> Vec<String> {
        vec![ToolType::AskAgent.example().to_string()]
    }

    async fn execute(&self, params: ToolParams, ctx: &ToolContext) -> Result<ToolResult> {
        let agent = params.required_str("agent", "the name of a configured agent")?;
        let question = params.required_str("content", "the question to ask")?;

        if !self.agents.names().iter().any(|n| n == agent) {
            return Ok(ToolResult::error(
                ErrorKind::InvalidArguments,
                format!(
                    "Unknown agent '{}'. Available agents: {}",
                    agent,
                    self.agents.names().join(", ")
                ),
            ));
        }

        let answer = tokio::select! {
            answer = self.agents.ask(agent, question) => answer,
            _ = ctx.cancellation.cancelled() => return Err(AgentError::Cancelled),
        };

        match answer {
            Ok(text) => Ok(ToolResult::success(text).with_metadata("agent", agent)),
            Err(AgentError::Transport(e)) => Ok(ToolResult::error(
                ErrorKind::ExecutionFailure,
                format!("Agent '{}' failed: {}", agent, e),
            )),
            Err(e) => Err(e),
        }
    }
}
