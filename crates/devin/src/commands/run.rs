//! Run command - drive an agent through a task with tools.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use console::Style;
use devin_agent::{AgentEvent, AgentOutcome, StopReason, ToolResult, tool::value_to_text};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::Context;
use crate::setup::{self, RunOptions};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// The task to work on
    #[arg(required = true)]
    pub task: String,

    /// Agent name from `[agents.<name>]`
    #[arg(short, long)]
    pub agent: String,

    /// Override `[engine] max_iterations`
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Directory tools operate in (default: current directory)
    #[arg(short = 'C', long, default_value = ".")]
    pub workdir: PathBuf,

    /// Hide tools that write files or execute commands
    #[arg(long)]
    pub read_only: bool,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config(Some(args.workdir.as_path()))?;
    let options = RunOptions {
        agent: args.agent,
        working_dir: args.workdir,
        max_iterations: args.max_iterations,
        read_only: args.read_only,
    };

    let cancel = CancellationToken::new();
    let executor =
        setup::build_executor(&loaded.config, &options)?.with_cancellation(cancel.clone());

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping agent");
            on_interrupt.cancel();
        }
    });

    let mut stream = executor.run(&args.task);
    let mut printer = EventPrinter::new(ctx.json_output, ctx.verbose);
    let mut outcome = None;
    while let Some(event) = stream.next().await {
        printer.print(&event)?;
        if let AgentEvent::Done { outcome: done } = event {
            outcome = Some(done);
        }
    }
    cancel.cancel();

    match outcome {
        Some(outcome) if outcome.success => Ok(()),
        Some(outcome) => bail!("{}", failure_message(&outcome)),
        None => bail!("Agent stopped without an outcome"),
    }
}

fn failure_message(outcome: &AgentOutcome) -> String {
    match outcome.stop_reason {
        StopReason::Completed => "Agent completed".to_string(),
        StopReason::MaxIterations => {
            format!("Agent hit the iteration limit ({})", outcome.iterations)
        }
        StopReason::Stuck => "Agent stopped after repeated tool failures".to_string(),
        StopReason::TransportError => "Agent backend request failed".to_string(),
        StopReason::Cancelled => "Agent run was cancelled".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

struct EventPrinter {
    json: bool,
    verbose: bool,
    mid_line: bool,
    dim: Style,
    red: Style,
    green: Style,
}

impl EventPrinter {
    fn new(json: bool, verbose: bool) -> Self {
        Self {
            json,
            verbose,
            mid_line: false,
            dim: Style::new().dim(),
            red: Style::new().red(),
            green: Style::new().green(),
        }
    }

    fn end_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }

    fn print(&mut self, event: &AgentEvent) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }

        match event {
            AgentEvent::Text { content } => {
                print!("{}", content);
                std::io::stdout().flush()?;
                self.mid_line = !content.ends_with('\n');
            }
            AgentEvent::ToolCall { tool_name, params } => {
                self.end_line();
                let summary = params
                    .iter()
                    .filter(|(key, _)| *key != "content")
                    .map(|(key, value)| {
                        let text = value_to_text(value);
                        format!("{}={}", key, text.lines().next().unwrap_or_default())
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                let label = format!("[Running: {} {}]", tool_name, summary);
                println!("{}", self.dim.apply_to(label.replace(" ]", "]")));
            }
            AgentEvent::ToolResult { result, .. } => {
                let line = match result {
                    ToolResult::Success { content, .. } => {
                        if self.verbose {
                            println!("{}", self.dim.apply_to(content));
                        }
                        self.green.apply_to("[done]".to_string())
                    }
                    ToolResult::Error {
                        message,
                        error_kind,
                    } => self
                        .red
                        .apply_to(format!("[failed: {} {}]", error_kind, first_line(message))),
                    ToolResult::Pending { session_id, .. } => self
                        .dim
                        .apply_to(format!("[running in background: {}]", session_id)),
                };
                println!("{}", line);
            }
            AgentEvent::Compressed {
                tokens_before,
                tokens_after,
            } => {
                self.end_line();
                println!(
                    "{}",
                    self.dim.apply_to(format!(
                        "[Compressed history: ~{} -> ~{} tokens]",
                        tokens_before, tokens_after
                    ))
                );
            }
            AgentEvent::Error { message } => {
                self.end_line();
                eprintln!("{} {}", self.red.apply_to("Error:"), message);
            }
            AgentEvent::Done { outcome } => {
                self.end_line();
                let summary = format!(
                    "[{} after {} iteration(s), {} tool call(s)]",
                    stop_label(outcome.stop_reason),
                    outcome.iterations,
                    outcome.steps.len()
                );
                if outcome.success {
                    println!("{}", self.dim.apply_to(summary));
                } else {
                    eprintln!("{}", self.red.apply_to(summary));
                }
            }
        }
        Ok(())
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn stop_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Completed => "Completed",
        StopReason::MaxIterations => "Iteration limit reached",
        StopReason::Stuck => "Stuck",
        StopReason::TransportError => "Backend error",
        StopReason::Cancelled => "Cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(stop_reason: StopReason) -> AgentOutcome {
        AgentOutcome {
            success: stop_reason == StopReason::Completed,
            iterations: 7,
            final_response: String::new(),
            steps: Vec::new(),
            stop_reason,
        }
    }

    #[test]
    fn test_failure_message() {
        assert!(failure_message(&outcome(StopReason::MaxIterations)).contains("(7)"));
        assert!(failure_message(&outcome(StopReason::Cancelled)).contains("cancelled"));
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("a\nb"), "a");
        assert_eq!(first_line(""), "");
    }
}
