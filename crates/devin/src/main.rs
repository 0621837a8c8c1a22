//! Devin - tool-calling coding agent
//!
//! Main entry point for the Devin CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod host;
mod setup;

use commands::{ask, config, parse, run, tools};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Devin - tool-calling coding agent
#[derive(Parser)]
#[command(name = "devin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: ~/.config/devin)
    #[arg(long, global = true, env = "DEVIN_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an agent on a task until it stops calling tools
    Run(run::RunArgs),

    /// Send one message to a configured agent
    Ask(ask::AskArgs),

    /// Extract tool calls from model output
    Parse(parse::ParseArgs),

    /// List the tools offered to the model
    Tools(tools::ToolsArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let console = console_filter(std::env::var("RUST_LOG").ok().as_deref(), cli.verbose);

    let log_dir = cli
        .config_dir
        .clone()
        .or_else(devin_config::user_config_dir)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "devin.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(console),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "devin=trace,devin_agent=trace,devin_llm=trace,devin_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir: cli.config_dir,
    };

    match cli.command {
        Commands::Run(args) => run::run(args, &ctx).await,
        Commands::Ask(args) => ask::run(args, &ctx).await,
        Commands::Parse(args) => parse::run(args, &ctx).await,
        Commands::Tools(args) => tools::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console log filter: `RUST_LOG` when set and valid, otherwise a default
/// chosen by `--verbose`.
fn console_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    let directives = if verbose {
        "devin=debug,devin_agent=debug,devin_llm=debug,devin_config=debug,info"
    } else {
        "devin=warn,devin_agent=warn,devin_llm=warn,warn"
    };
    rust_log
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(directives))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_filter_honors_rust_log() {
        let filter = console_filter(Some("devin_llm=trace"), false);
        assert_eq!(filter.to_string(), "devin_llm=trace");
    }

    #[test]
    fn test_console_filter_defaults() {
        assert!(console_filter(None, false).to_string().contains("devin=warn"));
        assert!(console_filter(Some(""), true).to_string().contains("devin=debug"));
        assert!(
            console_filter(Some("devin=loud"), false)
                .to_string()
                .contains("devin_agent=warn")
        );
    }
}
