// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};

/// Command-line front end for `arnd`, the agent task-runner daemon.
#[derive(Parser)]
#[command(name = "arn", version, about = "Submit and track agent coding tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether arnd is reachable.
    Ping,
    /// Submit a new task to an environment.
    Submit {
        environment_id: String,
        /// Task prompt; reads from stdin if omitted.
        prompt: Option<String>,
    },
    /// Show a task's current status.
    Status { task_id: String },
    /// List tasks, optionally filtered to one environment or to active ones.
    List {
        #[arg(long = "env")]
        environment_id: Option<String>,
        #[arg(long)]
        active: bool,
    },
    /// Print a task's logs, optionally following new output live.
    Logs {
        task_id: String,
        #[arg(long, short)]
        follow: bool,
    },
    /// Request a graceful stop of a running task.
    Stop { task_id: String },
    /// Forcibly terminate a running task's container.
    Kill { task_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ping => commands::ping().await,
        Command::Submit { environment_id, prompt } => {
            let prompt = match prompt {
                Some(prompt) => prompt,
                None => read_stdin_prompt()?,
            };
            commands::submit(&environment_id, prompt).await
        }
        Command::Status { task_id } => commands::status(&task_id).await,
        Command::List { environment_id, active } => commands::list(environment_id.as_deref(), active).await,
        Command::Logs { task_id, follow } => commands::logs(&task_id, follow).await,
        Command::Stop { task_id } => commands::stop(&task_id).await,
        Command::Kill { task_id } => commands::kill(&task_id).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn read_stdin_prompt() -> anyhow::Result<String> {
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    if buf.trim().is_empty() {
        anyhow::bail!("no prompt given and stdin was empty");
    }
    Ok(buf)
}
