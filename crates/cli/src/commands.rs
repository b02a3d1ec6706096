// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One handler per subcommand. Each connects fresh, so a long `--follow`
//! doesn't hold a socket the rest of the CLI might need.

use crate::client::DaemonClient;
use crate::output;
use anyhow::{bail, Result};
use arn_core::environment::EnvironmentId;
use arn_core::event::TaskEvent;
use arn_core::task::TaskId;

pub async fn submit(environment_id: &str, prompt: String) -> Result<()> {
    let client = DaemonClient::connect().await?;
    let task = client.submit(EnvironmentId::from_string(environment_id), prompt).await?;
    println!("submitted {}", task.task_id);
    output::print_task_detail(&task);
    Ok(())
}

pub async fn status(task_id: &str) -> Result<()> {
    let client = DaemonClient::connect().await?;
    let task = client.status(TaskId::from_string(task_id)).await?;
    output::print_task_detail(&task);
    Ok(())
}

pub async fn list(environment_id: Option<&str>, active_only: bool) -> Result<()> {
    let client = DaemonClient::connect().await?;
    let env = environment_id.map(EnvironmentId::from_string);
    let tasks = client.list(env, active_only).await?;
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in &tasks {
        output::print_task_line(task);
    }
    Ok(())
}

pub async fn logs(task_id: &str, follow: bool) -> Result<()> {
    let client = DaemonClient::connect().await?;
    let id = TaskId::from_string(task_id);

    if !follow {
        let task = client.logs_snapshot(id).await?;
        output::print_log_lines(&task);
        return Ok(());
    }

    let (task, mut events) = client.logs_follow(id).await?;
    output::print_log_lines(&task);
    while let Some(event) = events.recv().await {
        let done = matches!(event, TaskEvent::Finalized { .. });
        println!("{}", format_event_line(&event));
        if done {
            break;
        }
    }
    Ok(())
}

/// Render one streamed event as a line of terminal output. Plain log lines
/// pass through unadorned; everything else gets a `--` marker so it reads
/// as daemon commentary rather than program output.
fn format_event_line(event: &TaskEvent) -> String {
    match event {
        TaskEvent::Log { line, .. } => line.clone(),
        TaskEvent::State { status, .. } => format!("-- status: {status:?} --"),
        TaskEvent::RetryAttempt { attempt_number, backoff, .. } => {
            format!("-- retrying (attempt {attempt_number}) after {}ms --", backoff.as_millis())
        }
        TaskEvent::AgentSwitched { to, .. } => format!("-- switched agent: {to} --"),
        TaskEvent::Done { exit_code, classification, .. } => {
            format!("-- attempt finished: exit={exit_code:?} classification={classification:?} --")
        }
        TaskEvent::Finalized { success, error, .. } => {
            if *success {
                "-- finalized --".to_string()
            } else {
                format!("-- finalized with error: {} --", error.clone().unwrap_or_default())
            }
        }
    }
}

pub async fn stop(task_id: &str) -> Result<()> {
    let client = DaemonClient::connect().await?;
    client.stop(TaskId::from_string(task_id)).await?;
    println!("stop requested for {task_id}");
    Ok(())
}

pub async fn kill(task_id: &str) -> Result<()> {
    let client = DaemonClient::connect().await?;
    client.kill(TaskId::from_string(task_id)).await?;
    println!("kill requested for {task_id}");
    Ok(())
}

pub async fn ping() -> Result<()> {
    let client = match DaemonClient::connect().await {
        Ok(client) => client,
        Err(e) => bail!("{e}"),
    };
    client.ping().await?;
    println!("arnd is running");
    Ok(())
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
