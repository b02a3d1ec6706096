// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery (C12) — reconciling persisted task state against reality after
//! a restart, and again on a periodic tick so a task that falls through the
//! cracks doesn't stay stuck forever. Every task loaded from `tasks/` is
//! compared against the in-memory map first: anything already tracked has
//! a live executor loop driving it, so reconciliation only ever touches
//! tasks the current process doesn't yet know about.

use crate::executor;
use crate::runtime::Runtime;
use arn_core::task::{FinalizationState, Task, TaskId};
use std::sync::Arc;
use std::time::Duration;

const CONTAINER_MISSING_ERROR: &str = "container missing on restart";

/// How often the periodic recovery tick re-reconciles active task files
/// against the in-memory map and container state.
pub const RECOVERY_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Reconcile every active task file against the current process: run once
/// at startup, before the listener starts accepting connections.
pub async fn recover_at_startup(runtime: &Arc<Runtime>) {
    reconcile(runtime).await;
}

/// Spawn a background task that re-runs [`reconcile`] on a fixed interval,
/// catching anything a crashed executor loop left stranded.
pub fn spawn_periodic_tick(runtime: Arc<Runtime>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            reconcile(&runtime).await;
        }
    });
}

async fn reconcile(runtime: &Arc<Runtime>) {
    let tasks = match arn_storage::tasks::load_active_tasks(&runtime.data_dir).await {
        Ok(tasks) => tasks,
        Err(e) => {
            tracing::error!(error = %e, "failed to list active task files during recovery");
            return;
        }
    };

    for task in tasks {
        reconcile_task(runtime, task).await;
    }
}

async fn reconcile_task(runtime: &Arc<Runtime>, task: Task) {
    let task_id = task.task_id;
    if runtime.task(task_id).is_some() {
        // Already tracked by a live executor loop in this process; nothing to do.
        return;
    }

    if task.status.is_terminal() {
        reconcile_terminal(runtime, task).await;
        return;
    }

    if !task.status.is_active() {
        // Queued but never launched (the process died before the executor
        // loop got as far as `Starting`). Safe to restart from scratch.
        tracing::info!(%task_id, status = ?task.status, "resuming a task that never got past queued");
        runtime.upsert_task(task);
        executor::spawn(Arc::clone(runtime), task_id);
        return;
    }

    match task.container_id.clone() {
        Some(container_id) if runtime.supervisor.container_exists(&container_id).await => {
            tracing::info!(%task_id, container_id = %container_id, "container survived the restart, reattaching");
            runtime.upsert_task(task);
            executor::spawn_reattached(Arc::clone(runtime), task_id, container_id.clone());
        }
        Some(container_id) => {
            tracing::warn!(%task_id, container_id = %container_id, "container is gone, marking the task failed");
            runtime.upsert_task(task);
            mark_container_missing(runtime, task_id).await;
        }
        None => {
            tracing::warn!(%task_id, status = ?task.status, "active task has no recorded container id, marking it failed");
            runtime.upsert_task(task);
            mark_container_missing(runtime, task_id).await;
        }
    }
}

/// A task that was already terminal when we found it. If finalization had
/// finished, its active file surviving past the last restart is itself a
/// bug (a crash between archiving and removing the active copy) — archive
/// it and move on. Otherwise queue finalization, same as any other
/// recovery-triggered run.
async fn reconcile_terminal(runtime: &Arc<Runtime>, task: Task) {
    let task_id = task.task_id;
    if task.finalization_state == FinalizationState::Done {
        tracing::warn!(%task_id, "terminal task with finalization already done found in the active directory, archiving");
        if let Err(e) = arn_storage::tasks::archive_active_task_file(&runtime.data_dir, task_id.as_str()).await {
            tracing::error!(%task_id, error = %e, "failed to archive a stale terminal task file");
        }
        return;
    }

    tracing::info!(%task_id, status = ?task.status, "resuming finalization for a task left terminal but unfinalized");
    runtime.upsert_task(task);
    executor::spawn_finalize_recovered(Arc::clone(runtime), task_id);
}

async fn mark_container_missing(runtime: &Arc<Runtime>, task_id: TaskId) {
    if executor::mark_failed(runtime, task_id, CONTAINER_MISSING_ERROR, Some(1)).await.is_err() {
        tracing::error!(%task_id, "failed to persist container-missing failure during recovery");
        return;
    }
    if let Some(task) = runtime.task(task_id) {
        if task.status.is_terminal() && task.finalization_state != FinalizationState::Done {
            executor::spawn_finalize_recovered(Arc::clone(runtime), task_id);
        }
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
