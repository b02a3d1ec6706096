// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-request handlers. Split out from `mod.rs` so the accept loop and
//! connection framing stay free of business logic.

use crate::runtime::Runtime;
use arn_core::environment::WorkspaceType;
use arn_core::task::{FinalizationState, Task, TaskId, TaskStatus};
use arn_wire::{Request, Response};
use std::sync::Arc;

/// Dispatch one request-response exchange (everything except the
/// `Logs { follow: true }` streaming case, which `mod.rs` handles directly).
pub async fn dispatch(runtime: &Arc<Runtime>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,
        Request::Submit { environment_id, prompt } => submit(runtime, environment_id, prompt).await,
        Request::Status { task_id } => status(runtime, task_id).await,
        Request::List { environment_id, active_only } => {
            Response::Tasks { tasks: runtime.list_tasks(environment_id, active_only) }
        }
        Request::Logs { task_id, follow: false } => status(runtime, task_id).await,
        Request::Logs { follow: true, .. } => unreachable!("follow is intercepted before dispatch"),
        Request::Stop { task_id } => {
            runtime.supervisor.request_stop(task_id).await;
            Response::Ok
        }
        Request::Kill { task_id } => {
            runtime.supervisor.request_kill(task_id).await;
            Response::Ok
        }
    }
}

async fn submit(runtime: &Arc<Runtime>, environment_id: arn_core::environment::EnvironmentId, prompt: String) -> Response {
    let Some(env) = runtime.environment(environment_id) else {
        return Response::Error { message: format!("unknown environment {environment_id}") };
    };
    if env.agent_selection.is_empty() {
        return Response::Error { message: "environment has no agent instances configured".into() };
    }
    let active_count = runtime
        .tasks
        .lock()
        .values()
        .filter(|t| t.environment_id == environment_id && t.status.is_active())
        .count();
    if !env.admits_more(active_count) {
        return Response::Error { message: "environment has reached max_agents_running".into() };
    }

    let task_id = TaskId::new();
    let host_workdir = workdir_for(runtime, &env, task_id);
    let task = Task {
        task_id,
        prompt,
        environment_id,
        image: env.image.clone(),
        host_workdir,
        host_config_dir: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        finished_at: None,
        status: TaskStatus::Queued,
        exit_code: None,
        error: None,
        container_id: None,
        workspace_type: env.workspace_type,
        gh_repo_root: None,
        gh_base_branch: None,
        gh_branch: None,
        gh_pr_url: None,
        agent_cli: None,
        agent_instance_id: None,
        attempt_history: Vec::new(),
        artifacts: Vec::new(),
        logs: Vec::new(),
        finalization_state: FinalizationState::Pending,
        finalization_error: None,
    };

    runtime.upsert_task(task.clone());
    if let Err(e) = arn_storage::tasks::save_task(&runtime.data_dir, &task, false).await {
        tracing::error!(%task_id, error = %e, "failed to persist newly submitted task");
    }
    crate::executor::spawn(Arc::clone(runtime), task_id);
    Response::Submitted { task }
}

fn workdir_for(runtime: &Runtime, env: &arn_core::environment::Environment, task_id: TaskId) -> std::path::PathBuf {
    match env.workspace_type {
        WorkspaceType::Mounted => std::path::PathBuf::from(&env.workspace_target),
        WorkspaceType::Cloned => runtime.data_dir.join("workspaces").join(task_id.as_str()),
        WorkspaceType::None => runtime.data_dir.join("workspaces").join(task_id.as_str()),
    }
}

/// Look up a task's snapshot: in-memory first (covers active and
/// not-yet-GC'd tasks), falling back to its archived file on disk.
async fn status(runtime: &Runtime, task_id: TaskId) -> Response {
    if let Some(task) = runtime.task(task_id) {
        return Response::Task { task };
    }
    match arn_storage::tasks::load_task(&runtime.data_dir, task_id.as_str(), true).await {
        Some(task) => Response::Task { task },
        None => Response::Error { message: format!("unknown task {task_id}") },
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
