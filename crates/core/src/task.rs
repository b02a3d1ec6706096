// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Task entity and its state machine vocabulary (C9).

use crate::agent::AgentInstanceId;
use crate::define_id;
use crate::environment::{EnvironmentId, WorkspaceType};
use crate::simple_display;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

define_id! {
    pub struct TaskId("task");
}

/// Per-task execution status. This enum only names the states; the
/// transition diagram lives in the Supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    Pulling,
    Cloning,
    Created,
    Starting,
    Running,
    Paused,
    Exited,
    Done,
    Failed,
    Cancelled,
    Killed,
    Unknown,
    Discarded,
}

simple_display! {
    enum TaskStatus {
        Queued => "queued",
        Pulling => "pulling",
        Cloning => "cloning",
        Created => "created",
        Starting => "starting",
        Running => "running",
        Paused => "paused",
        Exited => "exited",
        Done => "done",
        Failed => "failed",
        Cancelled => "cancelled",
        Killed => "killed",
        Unknown => "unknown",
        Discarded => "discarded",
    }
}

impl TaskStatus {
    /// Terminal for re-launch: the task will never transition again from
    /// one of these on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled | Self::Killed | Self::Discarded)
    }

    /// Holds an active container: a task must never be both active and
    /// finalized at once.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Pulling | Self::Cloning | Self::Created | Self::Starting | Self::Running | Self::Paused
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalizationState {
    Pending,
    Running,
    Done,
    Error,
}

simple_display! {
    enum FinalizationState {
        Pending => "pending",
        Running => "running",
        Done => "done",
        Error => "error",
    }
}

/// Classification of a finished attempt, driving the retry/fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitClass {
    Success,
    ContainerCrash,
    RateLimited,
    Fatal,
    AgentFailure,
    Retryable,
}

impl ExitClass {
    pub fn is_retryable_same_agent(self) -> bool {
        matches!(self, Self::ContainerCrash | Self::RateLimited | Self::Retryable)
    }

    pub fn allows_fallback(self) -> bool {
        matches!(self, Self::AgentFailure | Self::ContainerCrash | Self::RateLimited | Self::Retryable)
    }
}

/// One launch of a task with one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub agent_id: AgentInstanceId,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub exit_code: Option<i32>,
    pub classification: Option<ExitClass>,
}

/// A single submission, and everything accumulated while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub prompt: String,
    pub environment_id: EnvironmentId,
    pub image: String,
    pub host_workdir: PathBuf,
    pub host_config_dir: Option<PathBuf>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: TaskStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub container_id: Option<String>,
    pub workspace_type: WorkspaceType,
    pub gh_repo_root: Option<PathBuf>,
    pub gh_base_branch: Option<String>,
    pub gh_branch: Option<String>,
    pub gh_pr_url: Option<String>,
    pub agent_cli: Option<String>,
    pub agent_instance_id: Option<AgentInstanceId>,
    #[serde(default)]
    pub attempt_history: Vec<Attempt>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Capped ring: at most 5000 most-recent lines after trim.
    #[serde(default)]
    pub logs: Vec<String>,
    pub finalization_state: FinalizationState,
    pub finalization_error: Option<String>,
}

pub const MAX_LOG_LINES: usize = 5000;

impl Task {
    /// Append a log line, trimming the ring to [`MAX_LOG_LINES`].
    pub fn push_log(&mut self, line: String) {
        self.logs.push(line);
        if self.logs.len() > MAX_LOG_LINES {
            let excess = self.logs.len() - MAX_LOG_LINES;
            self.logs.drain(0..excess);
        }
    }

    /// Never active while finalization is running or done.
    pub fn violates_active_finalization_invariant(&self) -> bool {
        self.status.is_active() && matches!(self.finalization_state, FinalizationState::Running | FinalizationState::Done)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
