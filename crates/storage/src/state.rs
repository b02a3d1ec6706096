// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence (C11) — the `state.toml` half: global settings, the
//! Environment list, and per-agent-instance rate-limit cooldown state.
//! Task records live in per-file TOML under `tasks/`, handled by
//! [`crate::tasks`].

use crate::atomic::write_atomic;
use crate::PersistError;
use arn_core::agent::AgentInstanceId;
use arn_core::environment::Environment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Schema version. A `state.toml` carrying a different version is treated
/// as absent rather than migrated — task files are independent of this file
/// and are never lost by a settings reset.
pub const STATE_VERSION: u32 = 4;

/// Global settings carried in `state.toml`, loaded once at daemon startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Process-wide concurrent-task cap. `-1` means unbounded.
    #[serde(default = "default_max_agents_running_global")]
    pub max_agents_running_global: i64,
    /// Same-agent retry budget per attempt chain. Defaults to 0 (none):
    /// a retryable exit falls back to the next agent rather than retrying
    /// the one that just failed, unless an operator opts into retries by
    /// raising this in `state.toml`.
    #[serde(default = "default_max_retries_per_agent")]
    pub max_retries_per_agent: u32,
    #[serde(default = "default_standard_backoff_secs")]
    pub standard_backoff_secs: Vec<u64>,
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: Vec<u64>,
    #[serde(default = "default_artifact_drain_timeout_secs")]
    pub artifact_drain_timeout_secs: u64,
    #[serde(default = "default_layer_build_timeout_secs")]
    pub layer_build_timeout_secs: u64,
}

fn default_max_agents_running_global() -> i64 {
    -1
}
fn default_max_retries_per_agent() -> u32 {
    0
}
fn default_standard_backoff_secs() -> Vec<u64> {
    vec![5, 15, 45]
}
fn default_rate_limit_backoff_secs() -> Vec<u64> {
    vec![60, 120, 300]
}
fn default_artifact_drain_timeout_secs() -> u64 {
    30
}
fn default_layer_build_timeout_secs() -> u64 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_agents_running_global: default_max_agents_running_global(),
            max_retries_per_agent: default_max_retries_per_agent(),
            standard_backoff_secs: default_standard_backoff_secs(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            artifact_drain_timeout_secs: default_artifact_drain_timeout_secs(),
            layer_build_timeout_secs: default_layer_build_timeout_secs(),
        }
    }
}

/// One agent instance's recorded rate-limit cooldown, generalized from the
/// source's per-provider watch state to this model's per-instance agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentWatchEntry {
    pub agent_id: AgentInstanceId,
    pub cooldown_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cooldown_reason: String,
}

/// The full contents of `state.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub environments: Vec<Environment>,
    #[serde(default)]
    pub agent_watch: Vec<AgentWatchEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self { version: STATE_VERSION, settings: Settings::default(), environments: Vec::new(), agent_watch: Vec::new() }
    }
}

/// Load `state.toml` from `path`. A missing file, a parse failure, or a
/// schema version mismatch all yield a fresh default state rather than an
/// error — task files on disk are unaffected either way.
pub async fn load_state(path: &Path) -> StateFile {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(_) => return StateFile::default(),
    };
    match toml::from_str::<StateFile>(&text) {
        Ok(state) if state.version == STATE_VERSION => state,
        Ok(state) => {
            tracing::warn!(found = state.version, expected = STATE_VERSION, "state.toml schema mismatch, starting fresh");
            StateFile::default()
        }
        Err(e) => {
            tracing::warn!(error = %e, "state.toml failed to parse, starting fresh");
            StateFile::default()
        }
    }
}

/// Atomically write `state` to `path` via temp-file-then-rename, stamping
/// the current schema version regardless of what the caller set.
pub async fn save_state(path: &Path, state: &StateFile) -> Result<(), PersistError> {
    let mut state = state.clone();
    state.version = STATE_VERSION;
    let text = toml::to_string_pretty(&state)?;
    write_atomic(path, text.as_bytes()).await
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
