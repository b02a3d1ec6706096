// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arn_core::agent::{AgentSelection, SelectionMode};
use arn_core::environment::WorkspaceType;
use arn_core::task::{FinalizationState, TaskStatus};
use serial_test::serial;
use std::collections::{HashMap as StdHashMap, HashSet};
use tempfile::TempDir;

fn bare_environment() -> Environment {
    Environment {
        env_id: EnvironmentId::new(),
        name: "staging".into(),
        image: "ubuntu:24.04".into(),
        workspace_type: WorkspaceType::None,
        workspace_target: String::new(),
        workspace_locked: false,
        agent_selection: AgentSelection { selection_mode: SelectionMode::RoundRobin, agents: Vec::new(), agent_fallbacks: StdHashMap::new() },
        env_vars: StdHashMap::new(),
        extra_mounts: Vec::new(),
        preflight_script: None,
        headless_desktop_enabled: false,
        desktop_cache_enabled: false,
        container_caching_enabled: false,
        gh_context_enabled: false,
        cross_agent_allowlist: HashSet::new(),
        max_agents_running: -1,
        color_stain: None,
    }
}

fn bare_task(env_id: EnvironmentId, status: TaskStatus) -> Task {
    Task {
        task_id: TaskId::new(),
        prompt: "do something".into(),
        environment_id: env_id,
        image: "img".into(),
        host_workdir: "/tmp".into(),
        host_config_dir: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        finished_at: None,
        status,
        exit_code: None,
        error: None,
        container_id: None,
        workspace_type: WorkspaceType::None,
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

fn runtime(dir: &std::path::Path) -> Runtime {
    Runtime::new(dir.to_path_buf(), DockerDriver::new())
}

#[test]
#[serial]
fn resolve_data_dir_honors_the_env_override() {
    let original = std::env::var(STATE_DIR_ENV).ok();
    std::env::set_var(STATE_DIR_ENV, "/tmp/arn-state-override");
    assert_eq!(resolve_data_dir(), PathBuf::from("/tmp/arn-state-override"));
    match original {
        Some(v) => std::env::set_var(STATE_DIR_ENV, v),
        None => std::env::remove_var(STATE_DIR_ENV),
    }
}

#[tokio::test]
async fn load_state_on_a_fresh_directory_leaves_defaults_in_place() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    rt.load_state().await;
    assert!(rt.environments.lock().is_empty());
    assert_eq!(rt.settings.lock().max_agents_running_global, -1);
}

#[tokio::test]
async fn save_state_then_load_state_round_trips_an_environment() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let env = bare_environment();
    let env_id = env.env_id;
    rt.environments.lock().insert(env_id, env);
    rt.save_state().await.unwrap();

    let rt2 = runtime(dir.path());
    rt2.load_state().await;
    assert!(rt2.environments.lock().contains_key(&env_id));
}

#[tokio::test]
async fn save_state_persists_cooldowns_recorded_on_the_supervisor() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let agent_id = AgentInstanceId::new();
    rt.supervisor.selector().record_rate_limit(agent_id, chrono::Utc::now() + chrono::Duration::seconds(60), "rate_limited");
    rt.save_state().await.unwrap();

    let rt2 = runtime(dir.path());
    rt2.load_state().await;
    assert!(rt2.supervisor.selector().is_in_cooldown(agent_id, chrono::Utc::now()));
}

#[test]
fn list_tasks_filters_by_environment_and_active_only() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let env_a = EnvironmentId::new();
    let env_b = EnvironmentId::new();
    rt.upsert_task(bare_task(env_a, TaskStatus::Running));
    rt.upsert_task(bare_task(env_a, TaskStatus::Done));
    rt.upsert_task(bare_task(env_b, TaskStatus::Running));

    assert_eq!(rt.list_tasks(None, false).len(), 3);
    assert_eq!(rt.list_tasks(Some(env_a), false).len(), 2);
    assert_eq!(rt.list_tasks(None, true).len(), 2);
    assert_eq!(rt.list_tasks(Some(env_a), true).len(), 1);
}

#[tokio::test]
async fn publish_delivers_to_a_subscribed_receiver_and_prunes_dropped_ones() {
    let dir = TempDir::new().unwrap();
    let rt = runtime(dir.path());
    let task_id = TaskId::new();

    let (tx, mut rx) = mpsc::channel(4);
    rt.subscribe(task_id, tx);

    let (dead_tx, dead_rx) = mpsc::channel(4);
    rt.subscribe(task_id, dead_tx);
    drop(dead_rx);

    rt.publish(TaskEvent::Log { task_id, line: "hello".into() });
    let got = rx.recv().await.unwrap();
    assert!(matches!(got, TaskEvent::Log { line, .. } if line == "hello"));

    assert_eq!(rt.subscribers.lock().get(&task_id).map(|v| v.len()), Some(1));
}
