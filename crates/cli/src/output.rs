// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Text rendering for tasks: a one-line summary for `list`, a fuller block
//! for `status`/`submit`, and the "source[LEVEL] line" format defined for
//! container/process log output.

use arn_core::task::Task;

pub fn format_elapsed(since: chrono::DateTime<chrono::Utc>) -> String {
    let secs = (chrono::Utc::now() - since).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}

pub fn print_task_line(task: &Task) {
    let age = format_elapsed(task.created_at);
    let exit = task.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
    println!(
        "{:<23}  {:<10}  {:<10}  exit={:<4}  {}",
        task.task_id,
        format!("{:?}", task.status).to_lowercase(),
        age,
        exit,
        task.prompt.lines().next().unwrap_or("")
    );
}

pub fn print_task_detail(task: &Task) {
    println!("task        {}", task.task_id);
    println!("environment {}", task.environment_id);
    println!("status      {:?}", task.status);
    println!("image       {}", task.image);
    println!("prompt      {}", task.prompt);
    if let Some(agent) = &task.agent_cli {
        println!("agent       {agent}");
    }
    if let Some(container_id) = &task.container_id {
        println!("container   {container_id}");
    }
    if let Some(exit_code) = task.exit_code {
        println!("exit_code   {exit_code}");
    }
    if let Some(error) = &task.error {
        println!("error       {error}");
    }
    if let Some(pr_url) = &task.gh_pr_url {
        println!("pr          {pr_url}");
    }
    println!("finalized   {:?}", task.finalization_state);
    if !task.attempt_history.is_empty() {
        println!("attempts    {}", task.attempt_history.len());
    }
}

pub fn print_log_lines(task: &Task) {
    for line in &task.logs {
        println!("{line}");
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
