// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Environment entity: a user-configured template binding a workspace
//! source, agent selection, preflight scripts, and run limits.

use crate::agent::{AgentInstanceId, AgentSelection};
use crate::define_id;
use crate::simple_display;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

define_id! {
    pub struct EnvironmentId("env-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceType {
    Mounted,
    Cloned,
    None,
}

simple_display! {
    enum WorkspaceType {
        Mounted => "mounted",
        Cloned => "cloned",
        None => "none",
    }
}

/// User-configured template binding a workspace source, agent selection,
/// preflight scripts, and run limits. Invariants are enforced by
/// [`Environment::set_workspace_target`] rather than left to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub env_id: EnvironmentId,
    pub name: String,
    /// Container image every task submitted against this environment is
    /// launched from, subject to the Image Cache's layered overlays.
    pub image: String,
    pub workspace_type: WorkspaceType,
    /// Local path for `Mounted`, URL or `owner/repo` for `Cloned`. Empty for `None`.
    pub workspace_target: String,
    /// Once true, `workspace_type`/`workspace_target` may never change again.
    #[serde(default)]
    pub workspace_locked: bool,
    pub agent_selection: AgentSelection,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    #[serde(default)]
    pub extra_mounts: Vec<crate::container::Mount>,
    #[serde(default)]
    pub preflight_script: Option<String>,
    #[serde(default)]
    pub headless_desktop_enabled: bool,
    #[serde(default)]
    pub desktop_cache_enabled: bool,
    #[serde(default)]
    pub container_caching_enabled: bool,
    #[serde(default)]
    pub gh_context_enabled: bool,
    /// Agent instances whose CLI context is also injected into sibling
    /// agents' prompts.
    #[serde(default)]
    pub cross_agent_allowlist: HashSet<AgentInstanceId>,
    /// -1 = unbounded.
    #[serde(default = "default_max_agents_running")]
    pub max_agents_running: i64,
    /// Cosmetic; carried through persistence but never interpreted by the core.
    #[serde(default)]
    pub color_stain: Option<String>,
}

fn default_max_agents_running() -> i64 {
    -1
}

/// Error raised when an Environment mutation would violate an invariant.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("workspace_target must be non-empty when workspace_type is not 'none'")]
    EmptyWorkspaceTarget,
    #[error("workspace_type/workspace_target are locked and cannot change")]
    WorkspaceLocked,
}

impl Environment {
    /// Set the workspace type/target, enforcing the non-empty-target and
    /// one-way-lock invariants.
    pub fn set_workspace_target(
        &mut self,
        workspace_type: WorkspaceType,
        target: String,
    ) -> Result<(), EnvironmentError> {
        if self.workspace_locked {
            return Err(EnvironmentError::WorkspaceLocked);
        }
        if workspace_type != WorkspaceType::None && target.trim().is_empty() {
            return Err(EnvironmentError::EmptyWorkspaceTarget);
        }
        self.workspace_type = workspace_type;
        self.workspace_target = target;
        self.workspace_locked = true;
        Ok(())
    }

    /// Count of non-terminal tasks permitted in this environment at once.
    /// `-1` means unbounded.
    pub fn admits_more(&self, active_count: usize) -> bool {
        self.max_agents_running < 0 || (active_count as i64) < self.max_agents_running
    }
}

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;
