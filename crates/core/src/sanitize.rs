// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt sanitization before a prompt crosses the shell boundary into a
//! container's entrypoint command.

/// Replace curly/smart double quotes with a backtick, matching the
/// characters a prompt-editing UI is prone to introduce via autocorrect.
/// Straight double quotes are replaced too, since the prompt is eventually
/// interpolated into a double-quoted shell argument.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .chars()
        .map(|c| match c {
            '"' | '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{201f}' => '`',
            other => other,
        })
        .collect()
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
