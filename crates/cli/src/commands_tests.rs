// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::format_event_line;
use arn_core::task::{ExitClass, TaskId, TaskStatus};
use std::time::Duration;

#[test]
fn a_log_event_renders_as_its_bare_line() {
    let task_id = TaskId::new();
    let event = arn_core::event::TaskEvent::Log { task_id, line: "building image".into() };
    assert_eq!(format_event_line(&event), "building image");
}

#[test]
fn a_state_event_renders_with_a_marker() {
    let task_id = TaskId::new();
    let event = arn_core::event::TaskEvent::State { task_id, status: TaskStatus::Running, container_id: None };
    assert_eq!(format_event_line(&event), "-- status: Running --");
}

#[test]
fn a_retry_event_renders_the_backoff_in_milliseconds() {
    let task_id = TaskId::new();
    let event = arn_core::event::TaskEvent::RetryAttempt {
        task_id,
        attempt_number: 2,
        agent_id: arn_core::agent::AgentInstanceId::new(),
        backoff: Duration::from_secs(3),
    };
    assert_eq!(format_event_line(&event), "-- retrying (attempt 2) after 3000ms --");
}

#[test]
fn a_successful_finalized_event_has_no_error_suffix() {
    let task_id = TaskId::new();
    let event = arn_core::event::TaskEvent::Finalized { task_id, success: true, error: None };
    assert_eq!(format_event_line(&event), "-- finalized --");
}

#[test]
fn a_failed_finalized_event_includes_the_error_message() {
    let task_id = TaskId::new();
    let event = arn_core::event::TaskEvent::Finalized {
        task_id,
        success: false,
        error: Some("workspace clone failed".into()),
    };
    assert_eq!(format_event_line(&event), "-- finalized with error: workspace clone failed --");
}

#[test]
fn a_done_event_includes_exit_code_and_classification() {
    let task_id = TaskId::new();
    let event =
        arn_core::event::TaskEvent::Done { task_id, exit_code: Some(1), classification: Some(ExitClass::AgentFailure) };
    assert_eq!(format_event_line(&event), "-- attempt finished: exit=Some(1) classification=Some(AgentFailure) --");
}
