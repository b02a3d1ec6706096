// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure data describing a container launch. Building one of these never
//! touches the filesystem or a container runtime — that's the Driver's job.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A bind mount from a host path into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub host: PathBuf,
    pub container: PathBuf,
    pub read_only: bool,
}

impl Mount {
    pub fn rw(host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Self {
        Self { host: host.into(), container: container.into(), read_only: false }
    }

    pub fn ro(host: impl Into<PathBuf>, container: impl Into<PathBuf>) -> Self {
        Self { host: host.into(), container: container.into(), read_only: true }
    }
}

/// Everything the Container Driver needs to start a container. Produced by
/// the Task Supervisor's launch sequence; consumed only by
/// [`crate::driver`]-style adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub workdir: PathBuf,
    pub env: Vec<(String, String)>,
    /// Ordered; duplicates allowed, but `container` destinations must be unique.
    pub mounts: Vec<Mount>,
    /// Forced platform string, e.g. `linux/amd64`, set by the Platform Probe.
    pub platform: Option<String>,
    pub ports: Vec<(u16, u16)>,
    pub tty: bool,
    /// The real entrypoint argv.
    pub argv: Vec<String>,
    /// When set, `run` launches this instead of `argv` and the real command
    /// is sent later via `exec` (used for interactive sessions).
    pub keepalive_argv: Option<Vec<String>>,
}

impl ContainerSpec {
    /// True if any two mounts target the same container path.
    pub fn has_duplicate_destinations(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.mounts.iter().any(|m| !seen.insert(&m.container))
    }
}

/// A snapshot of a container's lifecycle state, as reported by `inspect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    /// Lowercased runtime status, e.g. "running", "exited", "dead".
    pub status: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub exit_code: Option<i32>,
    pub oom_killed: bool,
}

impl ContainerState {
    pub fn is_active(&self) -> bool {
        matches!(self.status.as_str(), "created" | "running" | "paused" | "restarting")
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.status.as_str(), "exited" | "dead")
    }
}

/// The JSON marker an in-container entrypoint writes to the staging mount
/// on exit. Authoritative over `docker wait` when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub task_id: String,
    pub container_name: String,
    pub exit_code: i32,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub reason: String,
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
