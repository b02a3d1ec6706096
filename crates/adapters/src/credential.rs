// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GitHub token resolution for containerized tasks.
//!
//! Containerized agents run without access to the host's `gh` config, so
//! the daemon resolves a token from the host at launch time and injects it
//! as `GH_TOKEN` — but only when the agent's capabilities declare that it
//! needs one (see [`crate::registry`]).
//!
//! Resolution order:
//!
//! ```text
//! 1. GH_TOKEN env var
//! 2. GITHUB_TOKEN env var
//! 3. `gh auth token -h <host>`
//! ```

use std::time::Duration;

const DEFAULT_HOST: &str = "github.com";
const GH_TIMEOUT: Duration = Duration::from_secs(8);

/// Resolve a GitHub token for `host`, walking the fallback chain and
/// returning the first one found.
pub async fn resolve_github_token(host: &str) -> Option<String> {
    for key in ["GH_TOKEN", "GITHUB_TOKEN"] {
        if let Ok(value) = std::env::var(key) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    resolve_via_gh_cli(host).await
}

async fn resolve_via_gh_cli(host: &str) -> Option<String> {
    let host = if host.trim().is_empty() { DEFAULT_HOST } else { host.trim() };
    let output = tokio::time::timeout(
        GH_TIMEOUT,
        tokio::process::Command::new("gh").args(["auth", "token", "-h", host]).output(),
    )
    .await
    .ok()?
    .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let first = raw.lines().next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
