// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical log line formatting.
//!
//! Every log line the core produces — whether from a component directly or
//! wrapped from a container's stdout/stderr — matches
//! `^\[scope/subscope\]\[LEVEL\] message$`. This keeps the log stream
//! parseable by both the CLI's pretty-printer and any downstream log
//! aggregator without per-producer special-casing.

const LEVELS: &[&str] = &["DEBUG", "INFO", "WARN", "ERROR"];

/// Normalize a level string: uppercase, and fall back to `INFO` for
/// anything not in [`LEVELS`].
fn normalize_level(level: &str) -> &'static str {
    let upper = level.to_ascii_uppercase();
    match upper.as_str() {
        "DEBUG" => "DEBUG",
        "INFO" => "INFO",
        "WARN" | "WARNING" => "WARN",
        "ERROR" => "ERROR",
        _ => "INFO",
    }
}

/// Strip one or more leading canonical/nested headers (`[scope][LEVEL] `)
/// from `message`, so a message that already carries a header (e.g. it was
/// relayed from another canonical producer) doesn't end up double-wrapped.
fn strip_nested_headers(mut message: &str) -> &str {
    loop {
        let trimmed = message.trim_start();
        let Some(rest) = trimmed.strip_prefix('[') else { break };
        let Some(close1) = rest.find(']') else { break };
        let after_first = &rest[close1 + 1..];
        let Some(after_open2) = after_first.strip_prefix('[') else { break };
        let Some(close2) = after_open2.find(']') else { break };
        let level_candidate = &after_open2[..close2];
        if !LEVELS.contains(&level_candidate.to_ascii_uppercase().as_str()) {
            break;
        }
        let tail = &after_open2[close2 + 1..];
        message = tail.strip_prefix(' ').unwrap_or(tail);
    }
    message
}

/// Build a canonical `[scope/subscope][LEVEL] message` line.
///
/// Returns an empty string if `message` is empty after stripping any
/// nested headers — callers should skip emitting blank lines.
pub fn format_log_line(scope: &str, subscope: &str, level: &str, message: &str) -> String {
    let level = normalize_level(level);
    let message = strip_nested_headers(message);
    if message.is_empty() {
        return String::new();
    }
    let subscope = if subscope.is_empty() { "none" } else { subscope };
    format!("[{scope}/{subscope}][{level}] {message}")
}

/// Wrap a single line of container output into the canonical format.
///
/// `stream` is `"stdout"` or `"stderr"`; stderr is logged at `WARN`, stdout
/// at `INFO`. `container_id` is truncated to its first four characters per
/// the container-origin convention. A line that is already canonical is
/// passed through unchanged rather than re-wrapped.
pub fn wrap_container_log(container_id: &str, stream: &str, line: &str) -> String {
    if is_canonical(line) {
        return line.to_string();
    }
    let cid4 = crate::id::short(container_id, 4);
    let level = if stream == "stderr" { "WARN" } else { "INFO" };
    format_log_line(cid4, stream, level, line)
}

/// Returns true if `line` already matches the canonical format exactly at
/// its start (used to avoid double-wrapping).
pub fn is_canonical(line: &str) -> bool {
    parse_canonical(line).is_some()
}

/// A parsed canonical log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLogLine<'a> {
    pub scope: &'a str,
    pub subscope: &'a str,
    pub level: &'a str,
    pub message: &'a str,
}

/// Parse a canonical `[scope/subscope][LEVEL] message` line.
pub fn parse_canonical(line: &str) -> Option<ParsedLogLine<'_>> {
    let rest = line.strip_prefix('[')?;
    let close1 = rest.find(']')?;
    let header = &rest[..close1];
    let (scope, subscope) = header.split_once('/')?;
    if scope.is_empty() {
        return None;
    }
    let after_header = &rest[close1 + 1..];
    let after_open2 = after_header.strip_prefix('[')?;
    let close2 = after_open2.find(']')?;
    let level = &after_open2[..close2];
    if !LEVELS.contains(&level) {
        return None;
    }
    let tail = &after_open2[close2 + 1..];
    let message = tail.strip_prefix(' ').unwrap_or(tail);
    Some(ParsedLogLine { scope, subscope, level, message })
}

/// Strip ANSI escape sequences and control characters from a line, and drop
/// leading Docker ISO-8601 timestamp prefixes (`2024-01-01T00:00:00.000000000Z `)
/// or bracketed clock prefixes (`[12:30:01] `) before displaying a persisted
/// log line. Used only for display — never when the core produces a line.
pub fn prettify(line: &str) -> String {
    let mut s = line.trim_end_matches(['\r', '\n']).to_string();
    s = strip_ansi(&s);
    s = strip_control_chars(&s);
    s = strip_docker_timestamp_prefix(&s);
    s = strip_clock_prefix(&s);
    s.trim_end().to_string()
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            if chars.peek() == Some(&'[') {
                chars.next();
                while let Some(&c2) = chars.peek() {
                    chars.next();
                    if c2.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn strip_control_chars(s: &str) -> String {
    s.chars().filter(|c| !c.is_control() || *c == '\t').collect()
}

fn strip_docker_timestamp_prefix(s: &str) -> String {
    // RFC3339-nano prefix, e.g. "2024-01-02T03:04:05.123456789Z message"
    let bytes = s.as_bytes();
    if bytes.len() < 20 {
        return s.to_string();
    }
    let looks_like_ts = bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes[10] == b'T'
        && bytes[13] == b':'
        && bytes[16] == b':';
    if !looks_like_ts {
        return s.to_string();
    }
    if let Some(space) = s.find(' ') {
        let candidate = &s[..space];
        if candidate.ends_with('Z') && candidate.len() >= 20 {
            return s[space + 1..].to_string();
        }
    }
    s.to_string()
}

fn strip_clock_prefix(s: &str) -> String {
    let Some(rest) = s.strip_prefix('[') else { return s.to_string() };
    let Some(close) = rest.find(']') else { return s.to_string() };
    let candidate = &rest[..close];
    let parts: Vec<&str> = candidate.split(':').collect();
    let looks_like_clock = parts.len() == 3 && parts.iter().all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_digit()));
    if !looks_like_clock {
        return s.to_string();
    }
    rest[close + 1..].strip_prefix(' ').unwrap_or(&rest[close + 1..]).to_string()
}

#[cfg(test)]
#[path = "log_format_tests.rs"]
mod tests;
