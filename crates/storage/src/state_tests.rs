// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use arn_core::agent::{AgentSelection, SelectionMode};
use arn_core::environment::{Environment, EnvironmentId, WorkspaceType};
use std::collections::{HashMap, HashSet};
use tempfile::TempDir;

fn bare_environment() -> Environment {
    Environment {
        env_id: EnvironmentId::new(),
        name: "staging".into(),
        image: "ubuntu:24.04".into(),
        workspace_type: WorkspaceType::None,
        workspace_target: String::new(),
        workspace_locked: false,
        agent_selection: AgentSelection { selection_mode: SelectionMode::RoundRobin, agents: Vec::new(), agent_fallbacks: HashMap::new() },
        env_vars: HashMap::new(),
        extra_mounts: Vec::new(),
        preflight_script: None,
        headless_desktop_enabled: false,
        desktop_cache_enabled: false,
        container_caching_enabled: false,
        gh_context_enabled: false,
        cross_agent_allowlist: HashSet::new(),
        max_agents_running: -1,
        color_stain: None,
    }
}

#[tokio::test]
async fn load_state_returns_default_when_the_file_is_missing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.toml");
    let state = load_state(&path).await;
    assert_eq!(state.version, STATE_VERSION);
    assert!(state.environments.is_empty());
    assert!(state.agent_watch.is_empty());
    assert_eq!(state.settings, Settings::default());
}

#[tokio::test]
async fn load_state_returns_default_on_unparsable_contents() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.toml");
    tokio::fs::write(&path, b"this is not valid toml {{{").await.unwrap();
    let state = load_state(&path).await;
    assert_eq!(state.version, STATE_VERSION);
    assert!(state.environments.is_empty());
}

#[tokio::test]
async fn load_state_returns_default_on_schema_version_mismatch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.toml");
    tokio::fs::write(&path, b"version = 999\n").await.unwrap();
    let state = load_state(&path).await;
    assert_eq!(state.version, STATE_VERSION);
}

#[tokio::test]
async fn save_state_then_load_state_round_trips_settings_and_environments() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.toml");

    let mut state = StateFile::default();
    state.settings.max_agents_running_global = 8;
    state.environments.push(bare_environment());
    state.agent_watch.push(AgentWatchEntry {
        agent_id: arn_core::agent::AgentInstanceId::new(),
        cooldown_until: Some(Utc::now()),
        cooldown_reason: "rate_limited".into(),
    });

    save_state(&path, &state).await.unwrap();
    let loaded = load_state(&path).await;

    assert_eq!(loaded.settings.max_agents_running_global, 8);
    assert_eq!(loaded.environments.len(), 1);
    assert_eq!(loaded.agent_watch.len(), 1);
    assert_eq!(loaded.agent_watch[0].cooldown_reason, "rate_limited");
}

#[tokio::test]
async fn save_state_always_stamps_the_current_schema_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.toml");

    let mut state = StateFile::default();
    state.version = 1;
    save_state(&path, &state).await.unwrap();

    let text = tokio::fs::read_to_string(&path).await.unwrap();
    let reparsed: StateFile = toml::from_str(&text).unwrap();
    assert_eq!(reparsed.version, STATE_VERSION);
}

#[tokio::test]
async fn save_state_creates_missing_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deep").join("state.toml");
    save_state(&path, &StateFile::default()).await.unwrap();
    assert!(tokio::fs::metadata(&path).await.is_ok());
}
