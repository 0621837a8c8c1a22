//! Parse command - show the tool calls a model reply would trigger.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use devin_agent::{ToolCallParser, tool::value_to_text};

use super::Context;

/// Arguments for the parse command.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// File containing model output (reads stdin when omitted)
    pub file: Option<PathBuf>,
}

/// Run the parse command.
pub async fn run(args: ParseArgs, ctx: &Context) -> Result<()> {
    let text = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let calls = ToolCallParser::new().parse_tool_calls(&text);

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&calls)?);
        return Ok(());
    }

    if calls.is_empty() {
        println!("No tool calls found");
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();
    for call in &calls {
        println!("{}", bold.apply_to(&call.tool_name));
        for (key, value) in &call.params {
            let text = value_to_text(value);
            let first = text.lines().next().unwrap_or_default();
            let more = text.lines().count().saturating_sub(1);
            if more > 0 {
                println!("  {}={} {}", key, first, dim.apply_to(format!("(+{} lines)", more)));
            } else {
                println!("  {}={}", key, first);
            }
        }
    }
    Ok(())
}
