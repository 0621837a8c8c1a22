//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use console::Style;
use devin_config::{DevinConfig, EngineConfig, ToolsConfig};
use serde_json::json;

use super::Context;

/// Project-local config file name.
const PROJECT_CONFIG_FILE: &str = "devin.toml";

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration and configured agents
    Show,

    /// Show which config files are checked and loaded
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./devin.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Init { local, force } => cmd_init(ctx, local, force),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn user_config_path(ctx: &Context) -> Option<PathBuf> {
    ctx.config_dir
        .clone()
        .or_else(devin_config::user_config_dir)
        .map(|d| d.join("config.toml"))
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config(None)?;
    let config = &loaded.config;
    let engine = config.engine();
    let tools = config.tools();

    if ctx.json_output {
        let agents: Vec<_> = config
            .agents
            .iter()
            .map(|(name, agent)| {
                json!({
                    "name": name,
                    "url": agent.url,
                    "response_action": agent.response_action,
                    "auth": agent.auth.is_some(),
                })
            })
            .collect();
        let out = json!({
            "sources": loaded.loaded_from(),
            "engine": engine,
            "compression": config.compression(),
            "tools": tools,
            "agents": agents,
            "warnings": loaded.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("# Devin Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    print_engine(&engine);
    print_tools(&tools);
    print_agents(config, &dim);

    if !loaded.warnings.is_empty() {
        let yellow = Style::new().yellow();
        for warning in &loaded.warnings {
            println!("{} {}", yellow.apply_to("warning:"), warning);
        }
    }
    Ok(())
}

fn print_engine(engine: &EngineConfig) {
    println!("Engine:");
    println!("  max_iterations  {}", engine.max_iterations);
    println!("  plan_model      {}", engine.plan_model);
    println!("  read_only       {}", engine.read_only);
    if engine.system_prompt.is_some() {
        println!("  system_prompt   (custom)");
    }
    println!();
}

fn print_tools(tools: &ToolsConfig) {
    println!("Tools:");
    println!("  shell_timeout   {}s", tools.shell_timeout_secs);
    if let Some(secs) = tools.pending_after_secs {
        println!("  pending_after   {}s", secs);
    }
    if !tools.disabled.is_empty() {
        println!("  disabled        {}", tools.disabled.join(", "));
    }
    println!();
}

fn print_agents(config: &DevinConfig, dim: &Style) {
    if config.agents.is_empty() {
        println!("No agents configured\n");
        return;
    }
    println!("Agents:");
    for (name, agent) in &config.agents {
        let auth = match &agent.auth {
            Some(auth) if auth.resolve_token().is_some() => "(token set)",
            Some(_) => "(token missing)",
            None => "",
        };
        println!(
            "  {:<12} {:?} {} {}",
            name,
            agent.response_action,
            agent.url,
            dim.apply_to(auth)
        );
    }
    println!();
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config(None)?;

    if ctx.json_output {
        let sources: Vec<_> = loaded
            .sources
            .iter()
            .map(|s| json!({ "path": s.path, "loaded": s.loaded }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    let green = Style::new().green();
    let dim = Style::new().dim();
    println!("Config files (lowest precedence first):");
    for source in &loaded.sources {
        let status = if source.loaded {
            green.apply_to("loaded")
        } else {
            dim.apply_to("not found")
        };
        println!("  {}  {}", source.path.display(), status);
    }
    Ok(())
}

fn cmd_init(ctx: &Context, local: bool, force: bool) -> Result<()> {
    let path = if local {
        PathBuf::from(PROJECT_CONFIG_FILE)
    } else {
        match user_config_path(ctx) {
            Some(path) => path,
            None => bail!("Could not determine the user config directory"),
        }
    };

    if path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    let config = DevinConfig {
        engine: Some(EngineConfig::default()),
        compression: Some(Default::default()),
        tools: Some(ToolsConfig::default()),
        ..Default::default()
    };
    devin_config::save_config(&config, &path)?;

    if ctx.json_output {
        println!("{}", json!({ "created": path }));
    } else {
        println!("Created {}", path.display());
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match user_config_path(ctx) {
        Some(path) => println!("{}", path.display()),
        None => bail!("Could not determine the user config directory"),
    }
    Ok(())
}
