// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arn_adapters::DockerDriver;
use arn_core::event::TaskEvent;
use arn_core::task::{FinalizationState, Task, TaskStatus};
use arn_core::environment::WorkspaceType;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::BufReader as TokioBufReader;
use tokio::net::UnixStream;

fn bare_task(status: TaskStatus) -> Task {
    Task {
        task_id: arn_core::task::TaskId::new(),
        prompt: "do something".into(),
        environment_id: arn_core::environment::EnvironmentId::new(),
        image: "ubuntu:24.04".into(),
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

/// Spawn the listener against a fresh socket in a temp dir and return a
/// connected client stream plus the guarding `TempDir` (dropping it tears
/// the socket path down).
async fn spawn_listener() -> (Arc<Runtime>, UnixStream, TempDir) {
    let dir = TempDir::new().unwrap();
    let rt = Arc::new(Runtime::new(dir.path().to_path_buf(), DockerDriver::new()));
    let socket_path = rt.data_dir.join("arnd.sock");
    tokio::fs::create_dir_all(&rt.data_dir).await.unwrap();

    let rt_for_listener = Arc::clone(&rt);
    tokio::spawn(async move {
        let _ = run(rt_for_listener).await;
    });

    let client = loop {
        match UnixStream::connect(&socket_path).await {
            Ok(s) => break s,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    };
    (rt, client, dir)
}

#[tokio::test]
async fn ping_round_trips_over_the_socket() {
    let (_rt, client, _dir) = spawn_listener().await;
    let (read_half, mut write_half) = client.into_split();
    let mut reader = TokioBufReader::new(read_half);

    write_line_json(&mut write_half, &Request::Ping).await.unwrap();
    let response: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    assert_eq!(response, Response::Pong);
}

#[tokio::test]
async fn logs_follow_streams_events_until_finalized() {
    let (rt, client, _dir) = spawn_listener().await;
    let task = bare_task(TaskStatus::Running);
    let task_id = task.task_id;
    rt.upsert_task(task);

    let (read_half, mut write_half) = client.into_split();
    let mut reader = TokioBufReader::new(read_half);

    write_line_json(&mut write_half, &Request::Logs { task_id, follow: true }).await.unwrap();

    let snapshot: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    assert!(matches!(snapshot, Response::Task { task } if task.task_id == task_id));

    // give the handler a moment to register its subscription before publishing
    tokio::time::sleep(Duration::from_millis(20)).await;
    rt.publish(TaskEvent::Log { task_id, line: "building".into() });
    rt.publish(TaskEvent::Finalized { task_id, success: true, error: None });

    let log_event: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    assert!(matches!(log_event, Response::Event { event: TaskEvent::Log { ref line, .. } } if line == "building"));

    let finalized_event: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    assert!(matches!(finalized_event, Response::Event { event: TaskEvent::Finalized { .. } }));
}

#[tokio::test]
async fn logs_no_follow_on_a_finished_task_returns_its_snapshot_and_closes() {
    let (rt, client, _dir) = spawn_listener().await;
    let task = bare_task(TaskStatus::Done);
    let task_id = task.task_id;
    rt.upsert_task(task);

    let (read_half, mut write_half) = client.into_split();
    let mut reader = TokioBufReader::new(read_half);

    write_line_json(&mut write_half, &Request::Logs { task_id, follow: false }).await.unwrap();
    let response: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    assert!(matches!(response, Response::Task { task } if task.task_id == task_id && task.status == TaskStatus::Done));
}

#[tokio::test]
async fn logs_follow_on_an_unknown_task_reports_an_error_and_closes() {
    let (_rt, client, _dir) = spawn_listener().await;
    let (read_half, mut write_half) = client.into_split();
    let mut reader = TokioBufReader::new(read_half);

    write_line_json(&mut write_half, &Request::Logs { task_id: arn_core::task::TaskId::new(), follow: true }).await.unwrap();
    let response: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test]
async fn multiple_requests_on_one_connection_are_each_answered() {
    let (_rt, client, _dir) = spawn_listener().await;
    let (read_half, mut write_half) = client.into_split();
    let mut reader = TokioBufReader::new(read_half);

    write_line_json(&mut write_half, &Request::Ping).await.unwrap();
    write_line_json(&mut write_half, &Request::Ping).await.unwrap();

    let first: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    let second: Response = read_line_json(&mut reader).await.unwrap().unwrap();
    assert_eq!(first, Response::Pong);
    assert_eq!(second, Response::Pong);
}
