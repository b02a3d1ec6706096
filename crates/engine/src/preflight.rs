// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Preflight Compiler (C5).
//!
//! Converts up to four scripts (system, desktop, settings, environment)
//! into mount-ready temp files and a shell prelude that runs them in order
//! before handing off to the agent CLI.

use arn_core::container::Mount;
use std::path::{Path, PathBuf};

pub const STAGING_CONTAINER_PATH: &str = "/tmp/agents-artifacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    System,
    Desktop,
    Settings,
    Environment,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::System => "system",
            Phase::Desktop => "desktop",
            Phase::Settings => "settings",
            Phase::Environment => "environment",
        }
    }
}

/// One phase's script content, if the phase should run at container
/// start (as opposed to being cache-baked).
#[derive(Debug, Clone, Default)]
pub struct PreflightScripts {
    pub system: Option<String>,
    pub desktop: Option<String>,
    pub settings: Option<String>,
    pub environment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledPreflight {
    pub prelude: String,
    pub mounts: Vec<Mount>,
    /// Host-side temp files created; the caller deletes these on any exit path.
    pub temp_files: Vec<PathBuf>,
}

/// Compile the runtime-phase scripts into a prelude plus mounts. Scripts
/// already cache-baked into the image are omitted from `scripts` by the
/// caller and therefore produce no runtime mount or prelude step.
pub async fn compile(
    task_id: &str,
    scripts: &PreflightScripts,
    agent_cli: &str,
) -> std::io::Result<CompiledPreflight> {
    let mut mounts = Vec::new();
    let mut temp_files = Vec::new();
    let mut steps = String::new();

    for (phase, script) in [
        (Phase::System, &scripts.system),
        (Phase::Desktop, &scripts.desktop),
        (Phase::Settings, &scripts.settings),
        (Phase::Environment, &scripts.environment),
    ] {
        let Some(script) = script else { continue };
        if script.trim().is_empty() {
            continue;
        }
        let host_path = write_temp_script(task_id, phase, script).await?;
        let container_path = container_path_for(phase, task_id);
        mounts.push(Mount::ro(host_path.clone(), container_path.clone()));
        temp_files.push(host_path);
        steps.push_str(&render_phase_step(phase, &container_path));
    }

    let prelude = render_prelude(&steps, agent_cli);
    Ok(CompiledPreflight { prelude, mounts, temp_files })
}

async fn write_temp_script(task_id: &str, phase: Phase, script: &str) -> std::io::Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("agents-runner-preflight-{}-{task_id}.sh", phase.label()));
    tokio::fs::write(&path, script).await?;
    Ok(path)
}

fn container_path_for(phase: Phase, task_id: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/agents-runner-preflight-{}-{task_id}.sh", phase.label()))
}

fn render_phase_step(phase: Phase, container_path: &Path) -> String {
    let label = phase.label();
    let path = container_path.display();
    format!(
        "echo '[preflight] {label}: running'\nbash {path}\necho '[preflight] {label}: done'\n"
    )
}

fn render_prelude(steps: &str, agent_cli: &str) -> String {
    format!(
        "set -euo pipefail\n\
         if ! git config --global user.email >/dev/null 2>&1; then\n\
         \x20 git config --global user.email 'agent@agents-runner.local'\n\
         \x20 git config --global user.name 'Agents Runner'\n\
         fi\n\
         {steps}\
         command -v {agent_cli} >/dev/null 2>&1 || {{ echo \"{agent_cli} not found in PATH=$PATH\"; exit 127; }}\n"
    )
}

pub fn artifact_staging_mount(host_staging_dir: &Path) -> Mount {
    Mount::rw(host_staging_dir, PathBuf::from(STAGING_CONTAINER_PATH))
}

#[cfg(test)]
#[path = "preflight_tests.rs"]
mod tests;
