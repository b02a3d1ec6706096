// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drives one task from submission through to finalization: repeatedly
//! plans and runs attempts against the Supervisor, applies the retry /
//! fallback / finalize decision, and persists the task after every
//! meaningful transition. Spawned once per task by the listener (on
//! `Submit`) and by the recovery loop (on a resumed in-flight task).

use crate::runtime::Runtime;
use arn_core::agent::AgentInstanceId;
use arn_core::event::TaskEvent;
use arn_core::task::{TaskId, TaskStatus};
use arn_engine::finalizer::FinalizeContext;
use arn_engine::supervisor::{NextStep, RetryPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("environment {0} no longer exists")]
    EnvironmentMissing(String),
    #[error(transparent)]
    Supervisor(#[from] arn_engine::supervisor::SupervisorError),
    #[error(transparent)]
    Finalize(#[from] arn_engine::finalizer::FinalizeError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Persist(#[from] arn_storage::PersistError),
}

/// Spawn the driving loop for `task_id` as a detached task. Errors are
/// logged; they never propagate back to the caller, since by the time the
/// loop is running the submitting client has already been told `submitted`.
pub fn spawn(runtime: Arc<Runtime>, task_id: TaskId) {
    spawn_inner(runtime, task_id, None);
}

/// Resume driving a task recovered from persisted state whose container was
/// still alive when the daemon restarted. The loop's first iteration
/// re-attaches to `container_id` instead of planning a fresh attempt; every
/// iteration after that (a retry or fallback following the reattached
/// attempt) behaves exactly like a freshly submitted task.
pub fn spawn_reattached(runtime: Arc<Runtime>, task_id: TaskId, container_id: String) {
    spawn_inner(runtime, task_id, Some(container_id));
}

fn spawn_inner(runtime: Arc<Runtime>, task_id: TaskId, reattach_container_id: Option<String>) {
    tokio::spawn(async move {
        if let Err(e) = drive(&runtime, task_id, reattach_container_id).await {
            tracing::error!(%task_id, error = %e, "task execution loop exited with an error");
            let _ = mark_failed(&runtime, task_id, &e.to_string(), None).await;
        }
    });
}

/// Run finalization for a task discovered already terminal but not yet
/// finalized (a daemon restart raced a previous process between the
/// container exiting and finalization completing). Runs detached, same as
/// [`spawn`]; marked recovery-triggered so the cloned workspace, if any, is
/// left alone rather than raced against a separately issued cleanup.
pub fn spawn_finalize_recovered(runtime: Arc<Runtime>, task_id: TaskId) {
    tokio::spawn(async move {
        let Some(task) = runtime.task(task_id) else { return };
        let staging_dir = runtime.data_dir.join("staging").join(task_id.as_str());
        let environment_id = task.environment_id.as_str().to_string();
        if let Err(e) = finalize(&runtime, task_id, &environment_id, &staging_dir, true).await {
            tracing::error!(%task_id, error = %e, "recovery-triggered finalization failed");
        }
    });
}

async fn drive(runtime: &Arc<Runtime>, task_id: TaskId, mut reattach_container_id: Option<String>) -> Result<(), ExecutorError> {
    let retry_policy = retry_policy_from_settings(runtime);
    let mut forced_agent: Option<AgentInstanceId> = None;
    let mut retries_on_current_agent: u32 = 0;

    loop {
        let Some(task) = runtime.task(task_id) else {
            tracing::warn!(%task_id, "task disappeared from the in-memory map mid-flight");
            return Ok(());
        };
        let Some(env) = runtime.environment(task.environment_id) else {
            return Err(ExecutorError::EnvironmentMissing(task.environment_id.as_str().to_string()));
        };

        let staging_dir = runtime.data_dir.join("staging").join(task_id.as_str());
        tokio::fs::create_dir_all(&staging_dir).await?;

        let reattach = reattach_container_id.take().zip(task.agent_instance_id);
        let (agent_id, started_at, outcome) = if let Some((container_id, agent_id)) = reattach {
            let started_at = task.started_at.unwrap_or_else(chrono::Utc::now);
            tracing::info!(%task_id, container_id = %container_id, "reattaching to container found alive at startup");

            let (event_tx, event_rx) = mpsc::channel(256);
            let forwarder = spawn_event_forwarder(Arc::clone(runtime), task_id, event_rx);
            let outcome = runtime.supervisor.reattach_attempt(task_id, &container_id, event_tx).await?;
            let _ = forwarder.await;
            (agent_id, started_at, outcome)
        } else {
            let active_counts = active_agent_counts(runtime, task.environment_id);
            let plan = runtime.supervisor.plan_attempt(&task, &env, forced_agent, &staging_dir, &active_counts).await?;
            let agent_id = plan.agent_instance.agent_id;

            let started_at = chrono::Utc::now();
            runtime.update_task(task_id, |t| {
                t.status = TaskStatus::Starting;
                t.started_at.get_or_insert(started_at);
                t.agent_cli = Some(plan.agent_instance.agent_cli.clone());
                t.agent_instance_id = Some(plan.agent_instance.agent_id);
                t.gh_repo_root = plan.gh_repo_root.clone();
                t.gh_base_branch = plan.gh_base_branch.clone();
                t.gh_branch = plan.gh_branch.clone();
            });
            persist(runtime, task_id, false).await?;

            let (event_tx, event_rx) = mpsc::channel(256);
            let forwarder = spawn_event_forwarder(Arc::clone(runtime), task_id, event_rx);
            let outcome = runtime.supervisor.run_attempt(task_id, &plan, event_tx).await?;
            let _ = forwarder.await;
            (agent_id, started_at, outcome)
        };

        persist(runtime, task_id, false).await?;

        runtime.update_task(task_id, |t| {
            runtime.supervisor.record_attempt(t, agent_id, started_at, &outcome);
        });

        let next = runtime.supervisor.decide_next_step(&env, agent_id, &outcome, retries_on_current_agent, &retry_policy);
        match next {
            NextStep::RetrySameAgent { backoff, attempt_number } => {
                runtime.publish(TaskEvent::RetryAttempt { task_id, attempt_number, agent_id, backoff });
                retries_on_current_agent = attempt_number;
                forced_agent = Some(agent_id);
                tokio::time::sleep(backoff).await;
            }
            NextStep::Fallback { agent } => {
                runtime.publish(TaskEvent::AgentSwitched { task_id, from: agent_id, to: agent.agent_id });
                forced_agent = Some(agent.agent_id);
                retries_on_current_agent = 0;
            }
            NextStep::Finalize => {
                finalize(runtime, task_id, &task.environment_id.as_str().to_string(), &staging_dir, false).await?;
                return Ok(());
            }
        }
    }
}

fn spawn_event_forwarder(
    runtime: Arc<Runtime>,
    task_id: TaskId,
    mut rx: mpsc::Receiver<TaskEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            apply_event(&runtime, task_id, &event);
            runtime.publish(event);
        }
    })
}

/// Fold one `TaskEvent` into the in-memory task record: status changes and
/// log lines accumulate there so `arn status`/`arn logs` see them without
/// needing to replay the event stream.
fn apply_event(runtime: &Runtime, task_id: TaskId, event: &TaskEvent) {
    runtime.update_task(task_id, |t| match event {
        TaskEvent::State { status, container_id, .. } => {
            t.status = *status;
            if container_id.is_some() {
                t.container_id = container_id.clone();
            }
        }
        TaskEvent::Log { line, .. } => t.push_log(line.clone()),
        TaskEvent::Done { exit_code, classification: _, .. } => {
            t.exit_code = *exit_code;
        }
        TaskEvent::RetryAttempt { .. } | TaskEvent::AgentSwitched { .. } | TaskEvent::Finalized { .. } => {}
    });
}

/// Run the finalization pipeline for `task_id` and persist the result,
/// archiving the task file once finalization has concluded (successfully
/// or not — a task that fails to finalize still stops being "active").
async fn finalize(
    runtime: &Arc<Runtime>,
    task_id: TaskId,
    environment_id: &str,
    staging_dir: &std::path::Path,
    is_recovery_triggered: bool,
) -> Result<(), ExecutorError> {
    let Some(mut task) = runtime.task(task_id) else { return Ok(()) };
    let mut ctx = FinalizeContext::new(environment_id, staging_dir);
    ctx.is_recovery_triggered = is_recovery_triggered;

    let result = runtime.finalizer.finalize(&mut task, &ctx).await;
    let success = result.is_ok();
    let error = result.as_ref().err().map(|e| e.to_string());
    if task.status != TaskStatus::Cancelled && task.status != TaskStatus::Killed {
        task.status = if success { TaskStatus::Done } else { TaskStatus::Failed };
    }
    task.finished_at.get_or_insert(chrono::Utc::now());
    runtime.upsert_task(task.clone());

    persist(runtime, task_id, true).await?;
    let _ = tokio::fs::remove_dir_all(staging_dir).await;
    runtime.publish(TaskEvent::Finalized { task_id, success, error });
    runtime.remove_task(task_id);

    result.map_err(ExecutorError::from)
}

/// Mark a task failed and archive it. `exit_code` backfills a conventional
/// code (e.g. `1`) for failures that never produced one from a container.
pub(crate) async fn mark_failed(
    runtime: &Arc<Runtime>,
    task_id: TaskId,
    reason: &str,
    exit_code: Option<i32>,
) -> Result<(), ExecutorError> {
    runtime.update_task(task_id, |t| {
        t.status = TaskStatus::Failed;
        t.error = Some(reason.to_string());
        if let Some(code) = exit_code {
            t.exit_code.get_or_insert(code);
        }
        t.finished_at.get_or_insert(chrono::Utc::now());
    });
    persist(runtime, task_id, true).await
}

/// Write the task's current in-memory state to its file. When `archived`,
/// the content lands directly in `tasks/done/` (we always have the final,
/// up-to-date record in hand here, so there's nothing to move) and the
/// stale active-directory copy is removed.
async fn persist(runtime: &Runtime, task_id: TaskId, archived: bool) -> Result<(), ExecutorError> {
    let Some(task) = runtime.task(task_id) else { return Ok(()) };
    arn_storage::tasks::save_task(&runtime.data_dir, &task, archived).await?;
    if archived {
        let active_path = arn_storage::tasks::task_path(&runtime.data_dir, task_id.as_str(), false);
        let _ = tokio::fs::remove_file(active_path).await;
    }
    Ok(())
}

fn active_agent_counts(runtime: &Runtime, environment_id: arn_core::environment::EnvironmentId) -> HashMap<AgentInstanceId, usize> {
    let mut counts = HashMap::new();
    for task in runtime.tasks.lock().values() {
        if task.environment_id != environment_id || !task.status.is_active() {
            continue;
        }
        if let Some(agent_id) = task.agent_instance_id {
            *counts.entry(agent_id).or_insert(0) += 1;
        }
    }
    counts
}

fn retry_policy_from_settings(runtime: &Runtime) -> RetryPolicy {
    let settings = runtime.settings.lock();
    RetryPolicy {
        max_retries_per_agent: settings.max_retries_per_agent,
        standard_backoff: settings.standard_backoff_secs.iter().map(|s| std::time::Duration::from_secs(*s)).collect(),
        rate_limit_backoff: settings.rate_limit_backoff_secs.iter().map(|s| std::time::Duration::from_secs(*s)).collect(),
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
