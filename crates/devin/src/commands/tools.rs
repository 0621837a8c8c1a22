//! Tools command - list the tools the model can call.

use anyhow::Result;
use clap::Args;
use console::Style;
use devin_agent::ToolResultFormatter;

use super::Context;
use crate::setup;

/// Arguments for the tools command.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Only tools that neither write files nor execute commands
    #[arg(long)]
    pub read_only: bool,

    /// Print the tool section exactly as the model sees it
    #[arg(long)]
    pub prompt: bool,
}

/// Run the tools command.
pub async fn run(args: ToolsArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config(None)?;
    let registry = setup::build_registry(&loaded.config, None, None, args.read_only);
    let descriptors = registry.descriptors();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    if args.prompt {
        println!("{}", ToolResultFormatter::format_tool_list(&descriptors));
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();
    for tool in &descriptors {
        println!(
            "{:<12} {}  {}",
            bold.apply_to(&tool.name),
            dim.apply_to(format!("[{}]", tool.category.as_str())),
            tool.description
        );
    }
    Ok(())
}
