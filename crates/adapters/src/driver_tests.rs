// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn classify_cli_error_detects_no_such_container() {
    let err = classify_cli_error(&["stop", "abc"], "Error: No such container: abc");
    assert!(matches!(err, DriverError::NoSuchContainer(_)));
}

#[test]
fn classify_cli_error_detects_missing_image_on_pull() {
    let err = classify_cli_error(&["pull", "ghost:latest"], "Error response from daemon: pull access denied");
    assert!(matches!(err, DriverError::ImageUnavailable(_)));
}

#[test]
fn classify_cli_error_detects_manifest_unknown() {
    let err = classify_cli_error(&["run", "-d", "ghost:latest"], "manifest unknown: manifest unknown");
    assert!(matches!(err, DriverError::ImageUnavailable(_)));
}

#[test]
fn classify_cli_error_falls_back_to_other() {
    let err = classify_cli_error(&["kill", "abc"], "Error: something unexpected");
    assert!(matches!(err, DriverError::Other(_)));
}

#[test]
fn platform_args_empty_when_none() {
    assert!(platform_args(None).is_empty());
}

#[test]
fn platform_args_formats_flag() {
    assert_eq!(platform_args(Some("linux/amd64")), vec!["--platform=linux/amd64".to_string()]);
}

#[test]
fn parse_inspect_line_reads_all_fields() {
    let line = "running\t2026-01-01T00:00:00Z\t0001-01-01T00:00:00Z\t0\tfalse";
    let state = parse_inspect_line(line).unwrap();
    assert_eq!(state.status, "running");
    assert!(state.started_at.is_some());
    assert!(state.finished_at.is_none());
    assert_eq!(state.exit_code, Some(0));
    assert!(!state.oom_killed);
}

#[test]
fn parse_inspect_line_reports_oom_killed() {
    let line = "exited\t2026-01-01T00:00:00Z\t2026-01-01T00:05:00Z\t137\ttrue";
    let state = parse_inspect_line(line).unwrap();
    assert!(state.oom_killed);
    assert_eq!(state.exit_code, Some(137));
    assert!(state.is_exited());
}

#[test]
fn parse_inspect_line_rejects_malformed_input() {
    assert!(parse_inspect_line("not enough fields").is_none());
}

#[test]
fn parse_docker_time_rejects_zero_value() {
    assert!(parse_docker_time("0001-01-01T00:00:00Z").is_none());
}

#[test]
fn parse_docker_time_parses_rfc3339() {
    assert!(parse_docker_time("2026-03-05T12:30:00Z").is_some());
}

#[test]
fn container_spec_run_args_include_mounts_and_env() {
    let spec = ContainerSpec {
        image: "agents-runner:latest".into(),
        name: "arn-task-abc".into(),
        workdir: "/workspace".into(),
        env: vec![("GH_TOKEN".into(), "secret".into())],
        mounts: vec![Mount::rw("/host/proj", "/workspace")],
        platform: Some("linux/amd64".into()),
        ports: vec![],
        tty: false,
        argv: vec!["run-agent".into()],
        keepalive_argv: None,
    };
    assert!(!spec.has_duplicate_destinations());
}

#[tokio::test]
async fn missing_binary_surfaces_as_other_error() {
    let driver = DockerDriver { binary: "__arn_nonexistent_binary__".into() };
    let result = driver.kill("ghost").await;
    assert!(matches!(result, Err(DriverError::Other(_))));
}
