// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arn_core::environment::EnvironmentId;
use arn_core::task::{FinalizationState, TaskStatus};
use std::path::PathBuf;
use tempfile::TempDir;

fn runtime(dir: &std::path::Path) -> Runtime {
    Runtime::new(dir.to_path_buf(), arn_adapters::DockerDriver::new())
}

fn bare_task(env_id: EnvironmentId, status: TaskStatus) -> arn_core::task::Task {
    arn_core::task::Task {
        task_id: TaskId::new(),
        prompt: "write a test".into(),
        environment_id: env_id,
        image: "img".into(),
        host_workdir: PathBuf::from("/tmp"),
        host_config_dir: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        finished_at: None,
        status,
        exit_code: None,
        error: None,
        container_id: None,
        workspace_type: arn_core::environment::WorkspaceType::None,
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
    }
}

#[test]
fn active_agent_counts_only_counts_active_tasks_in_the_given_environment() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let env_a = EnvironmentId::new();
    let env_b = EnvironmentId::new();
    let agent = AgentInstanceId::new();
    let other_agent = AgentInstanceId::new();

    let mut running_a = bare_task(env_a, TaskStatus::Running);
    running_a.agent_instance_id = Some(agent);
    let mut done_a = bare_task(env_a, TaskStatus::Done);
    done_a.agent_instance_id = Some(agent);
    let mut running_a_other = bare_task(env_a, TaskStatus::Running);
    running_a_other.agent_instance_id = Some(other_agent);
    let mut running_b = bare_task(env_b, TaskStatus::Running);
    running_b.agent_instance_id = Some(agent);

    rt.upsert_task(running_a);
    rt.upsert_task(done_a);
    rt.upsert_task(running_a_other);
    rt.upsert_task(running_b);

    let counts = active_agent_counts(&rt, env_a);
    assert_eq!(counts.get(&agent).copied(), Some(1));
    assert_eq!(counts.get(&other_agent).copied(), Some(1));
    assert_eq!(counts.len(), 2);
}

#[test]
fn apply_event_state_updates_status_and_container_id() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let task = bare_task(EnvironmentId::new(), TaskStatus::Starting);
    let task_id = task.task_id;
    rt.upsert_task(task);

    apply_event(
        &rt,
        task_id,
        &TaskEvent::State { task_id, status: TaskStatus::Running, container_id: Some("abc123".into()) },
    );

    let updated = rt.task(task_id).unwrap();
    assert_eq!(updated.status, TaskStatus::Running);
    assert_eq!(updated.container_id.as_deref(), Some("abc123"));
}

#[test]
fn apply_event_log_appends_a_line_without_touching_status() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let task = bare_task(EnvironmentId::new(), TaskStatus::Running);
    let task_id = task.task_id;
    rt.upsert_task(task);

    apply_event(&rt, task_id, &TaskEvent::Log { task_id, line: "hello from the container".into() });

    let updated = rt.task(task_id).unwrap();
    assert_eq!(updated.logs, vec!["hello from the container".to_string()]);
    assert_eq!(updated.status, TaskStatus::Running);
}

#[test]
fn apply_event_done_records_the_exit_code() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let task = bare_task(EnvironmentId::new(), TaskStatus::Running);
    let task_id = task.task_id;
    rt.upsert_task(task);

    apply_event(
        &rt,
        task_id,
        &TaskEvent::Done { task_id, exit_code: Some(1), classification: Some(arn_core::task::ExitClass::AgentFailure) },
    );

    assert_eq!(rt.task(task_id).unwrap().exit_code, Some(1));
}

#[test]
fn retry_policy_from_settings_mirrors_configured_backoff_schedules() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    rt.settings.lock().standard_backoff_secs = vec![1, 2, 3];
    rt.settings.lock().rate_limit_backoff_secs = vec![10, 20];

    let policy = retry_policy_from_settings(&rt);
    assert_eq!(policy.standard_backoff, vec![
        std::time::Duration::from_secs(1),
        std::time::Duration::from_secs(2),
        std::time::Duration::from_secs(3),
    ]);
    assert_eq!(policy.rate_limit_backoff, vec![std::time::Duration::from_secs(10), std::time::Duration::from_secs(20)]);
}

#[test]
fn retry_policy_from_settings_defaults_same_agent_retries_to_zero() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());

    let policy = retry_policy_from_settings(&rt);
    assert_eq!(policy.max_retries_per_agent, 0);
}

#[test]
fn retry_policy_from_settings_honors_an_explicit_retry_budget() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    rt.settings.lock().max_retries_per_agent = 2;

    let policy = retry_policy_from_settings(&rt);
    assert_eq!(policy.max_retries_per_agent, 2);
}

#[tokio::test]
async fn mark_failed_backfills_an_exit_code_only_when_one_is_not_already_set() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(runtime(dir.path()));
    let mut task = bare_task(EnvironmentId::new(), TaskStatus::Running);
    task.exit_code = Some(7);
    let task_id = task.task_id;
    rt.upsert_task(task);

    mark_failed(&rt, task_id, "container missing on restart", Some(1)).await.unwrap();
    let updated = rt.task(task_id).unwrap();
    assert_eq!(updated.status, TaskStatus::Failed);
    assert_eq!(updated.exit_code, Some(7));

    let done = arn_storage::tasks::load_task(&rt.data_dir, task_id.as_str(), true).await.unwrap();
    assert_eq!(done.status, TaskStatus::Failed);
    assert_eq!(done.exit_code, Some(7));
    assert_eq!(done.error.as_deref(), Some("container missing on restart"));
}

#[tokio::test]
async fn mark_failed_assigns_the_given_exit_code_when_none_was_set() {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(runtime(dir.path()));
    let task = bare_task(EnvironmentId::new(), TaskStatus::Starting);
    let task_id = task.task_id;
    rt.upsert_task(task);

    mark_failed(&rt, task_id, "container missing on restart", Some(1)).await.unwrap();
    let done = arn_storage::tasks::load_task(&rt.data_dir, task_id.as_str(), true).await.unwrap();
    assert_eq!(done.exit_code, Some(1));
}

#[tokio::test]
async fn persist_writes_active_then_archived_moves_and_removes_the_active_copy() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let task = bare_task(EnvironmentId::new(), TaskStatus::Running);
    let task_id = task.task_id;
    rt.upsert_task(task);

    persist(&rt, task_id, false).await.unwrap();
    let active_path = arn_storage::tasks::task_path(&rt.data_dir, task_id.as_str(), false);
    assert!(active_path.exists());

    persist(&rt, task_id, true).await.unwrap();
    let done_path = arn_storage::tasks::task_path(&rt.data_dir, task_id.as_str(), true);
    assert!(done_path.exists());
    assert!(!active_path.exists());
}
