// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arn_core::task::TaskId;

#[test]
fn error_round_trips_through_json() {
    let resp = Response::Error { message: "no such task".into() };
    let text = serde_json::to_string(&resp).unwrap();
    let back: Response = serde_json::from_str(&text).unwrap();
    assert_eq!(resp, back);
}

#[test]
fn event_wraps_a_task_event_unchanged() {
    let event = TaskEvent::Log { task_id: TaskId::new(), line: "building image".into() };
    let resp = Response::Event { event: event.clone() };
    let text = serde_json::to_string(&resp).unwrap();
    let back: Response = serde_json::from_str(&text).unwrap();
    assert_eq!(resp, back);
    match back {
        Response::Event { event: got } => assert_eq!(got, event),
        other => panic!("expected Event, got {other:?}"),
    }
}

#[test]
fn tags_are_disjoint_from_inner_task_event_tags() {
    let value: serde_json::Value = serde_json::to_value(Response::Pong).unwrap();
    assert_eq!(value["type"], "Pong");
}
