// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn task() -> Task {
    Task {
        task_id: TaskId::new(),
        prompt: "add a README".into(),
        environment_id: EnvironmentId::new(),
        image: "agents-runner:latest".into(),
        host_workdir: "/tmp/proj".into(),
        host_config_dir: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        finished_at: None,
        status: TaskStatus::Queued,
        exit_code: None,
        error: None,
        container_id: None,
        workspace_type: WorkspaceType::Mounted,
        gh_repo_root: None,
        gh_base_branch: None,
        gh_branch: None,
        gh_pr_url: None,
        agent_cli: None,
        agent_instance_id: None,
        attempt_history: vec![],
        artifacts: vec![],
        logs: vec![],
        finalization_state: FinalizationState::Pending,
        finalization_error: None,
    }
}

#[parameterized(
    done = { TaskStatus::Done, true },
    failed = { TaskStatus::Failed, true },
    cancelled = { TaskStatus::Cancelled, true },
    killed = { TaskStatus::Killed, true },
    discarded = { TaskStatus::Discarded, true },
    queued = { TaskStatus::Queued, false },
    running = { TaskStatus::Running, false },
)]
fn is_terminal_matches_spec_terminal_set(status: TaskStatus, expected: bool) {
    assert_eq!(status.is_terminal(), expected);
}

#[parameterized(
    running = { TaskStatus::Running, true },
    paused = { TaskStatus::Paused, true },
    queued = { TaskStatus::Queued, false },
    done = { TaskStatus::Done, false },
)]
fn is_active_matches_spec_active_set(status: TaskStatus, expected: bool) {
    assert_eq!(status.is_active(), expected);
}

#[test]
fn push_log_trims_ring_to_max_lines() {
    let mut t = task();
    for i in 0..MAX_LOG_LINES + 10 {
        t.push_log(format!("line {i}"));
    }
    assert_eq!(t.logs.len(), MAX_LOG_LINES);
    assert_eq!(t.logs.first().unwrap(), "line 10");
    assert_eq!(t.logs.last().unwrap(), &format!("line {}", MAX_LOG_LINES + 9));
}

#[test]
fn invariant_violation_detects_active_plus_done_finalization() {
    let mut t = task();
    t.status = TaskStatus::Running;
    t.finalization_state = FinalizationState::Done;
    assert!(t.violates_active_finalization_invariant());
}

#[test]
fn invariant_holds_for_terminal_status_with_done_finalization() {
    let mut t = task();
    t.status = TaskStatus::Done;
    t.finalization_state = FinalizationState::Done;
    assert!(!t.violates_active_finalization_invariant());
}

#[test]
fn exit_class_retry_and_fallback_rules() {
    assert!(ExitClass::Success.is_retryable_same_agent() == false);
    assert!(ExitClass::ContainerCrash.is_retryable_same_agent());
    assert!(ExitClass::RateLimited.is_retryable_same_agent());
    assert!(ExitClass::Fatal.allows_fallback() == false);
    assert!(ExitClass::AgentFailure.allows_fallback());
}

#[test]
fn task_round_trips_through_toml() {
    let t = task();
    let s = toml::to_string(&t).unwrap();
    let back: Task = toml::from_str(&s).unwrap();
    assert_eq!(back.task_id, t.task_id);
    assert_eq!(back.status, t.status);
}
