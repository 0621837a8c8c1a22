//! Ask command - one-shot message to a configured agent.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use console::Style;
use devin_llm::StreamRequest;
use futures::StreamExt;

use super::Context;
use crate::setup;

/// Arguments for the ask command.
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The message to send
    #[arg(required = true)]
    pub prompt: String,

    /// Agent name from `[agents.<name>]`
    #[arg(short, long)]
    pub agent: String,
}

/// Run the ask command.
pub async fn run(args: AskArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config(None)?;
    let client = setup::build_client(&loaded.config, &args.agent)?;
    let dim = Style::new().dim();

    if ctx.verbose {
        eprintln!("{}", dim.apply_to(format!("Sending to: {}", args.agent)));
    }

    let mut stream = client.stream(StreamRequest::new(&args.prompt)).await?;

    if ctx.json_output {
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            reply.push_str(&chunk?);
        }
        println!(
            "{}",
            serde_json::json!({ "agent": args.agent, "response": reply })
        );
        return Ok(());
    }

    let mut has_output = false;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(text) => {
                print!("{}", text);
                std::io::stdout().flush()?;
                has_output = !text.is_empty() || has_output;
            }
            Err(e) => {
                let red = Style::new().red();
                if has_output {
                    eprintln!();
                }
                eprintln!("{} {}", red.apply_to("Error:"), e);
                return Err(e.into());
            }
        }
    }
    if has_output {
        println!();
    }
    Ok(())
}
