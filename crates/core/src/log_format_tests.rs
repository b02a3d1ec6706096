// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn format_log_line_matches_canonical_shape() {
    let line = format_log_line("preflight", "system", "info", "running");
    assert_eq!(line, "[preflight/system][INFO] running");
}

#[test]
fn format_log_line_defaults_subscope_to_none() {
    let line = format_log_line("preflight", "", "info", "running");
    assert_eq!(line, "[preflight/none][INFO] running");
}

#[parameterized(
    lower = { "warn", "WARN" },
    alt_spelling = { "warning", "WARN" },
    unknown = { "trace", "INFO" },
    mixed_case = { "ErRoR", "ERROR" },
)]
fn format_log_line_normalizes_level(input: &str, expected: &str) {
    let line = format_log_line("x", "y", input, "msg");
    assert!(line.starts_with(&format!("[x/y][{expected}]")));
}

#[test]
fn format_log_line_strips_nested_header() {
    let line = format_log_line("outer", "s", "info", "[inner/sub][WARN] boom");
    assert_eq!(line, "[outer/s][INFO] boom");
}

#[test]
fn format_log_line_returns_empty_for_blank_message() {
    assert_eq!(format_log_line("x", "y", "info", ""), "");
}

#[test]
fn wrap_container_log_uses_first_four_id_chars() {
    let line = wrap_container_log("abcdef1234567890", "stdout", "hello");
    assert_eq!(line, "[abcd/stdout][INFO] hello");
}

#[test]
fn wrap_container_log_maps_stderr_to_warn() {
    let line = wrap_container_log("abcdef1234567890", "stderr", "oops");
    assert_eq!(line, "[abcd/stderr][WARN] oops");
}

#[test]
fn wrap_container_log_does_not_double_wrap() {
    let already = "[abcd/stdout][INFO] hello";
    assert_eq!(wrap_container_log("abcdef1234567890", "stdout", already), already);
}

#[test]
fn parse_canonical_round_trips_with_format() {
    let line = format_log_line("abcd", "stdout", "warn", "boom");
    let parsed = parse_canonical(&line).unwrap();
    assert_eq!(parsed.scope, "abcd");
    assert_eq!(parsed.subscope, "stdout");
    assert_eq!(parsed.level, "WARN");
    assert_eq!(parsed.message, "boom");
}

#[test]
fn parse_canonical_rejects_non_matching_lines() {
    assert!(parse_canonical("just a plain line").is_none());
    assert!(parse_canonical("[no-slash][INFO] msg").is_none());
    assert!(parse_canonical("[a/b][WEIRD] msg").is_none());
}

#[test]
fn every_produced_line_matches_the_testable_property_regex() {
    // Every produced line matches
    // ^\[[^/\]]+/[^\]]+\]\[(DEBUG|INFO|WARN|ERROR)\] .*$
    let re_like = |s: &str| {
        let parsed = parse_canonical(s);
        parsed.is_some_and(|p| !p.scope.contains('/') && !p.scope.contains(']'))
    };
    assert!(re_like(&format_log_line("abcd", "stdout", "info", "hi")));
    assert!(re_like(&wrap_container_log("deadbeef", "stderr", "x")));
}

#[test]
fn prettify_strips_ansi_control_and_timestamp_prefixes() {
    let raw = "2024-01-02T03:04:05.123456789Z \u{1b}[31m[12:30:01] hello\u{1b}[0m\r\n";
    assert_eq!(prettify(raw), "hello");
}

#[test]
fn prettify_leaves_plain_lines_untouched() {
    assert_eq!(prettify("hello world"), "hello world");
}
