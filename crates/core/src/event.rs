// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `TaskEvent` — a tagged union replacing an `on_state` / `on_log` /
//! `on_done` callback triplet. A single ordered per-task channel carries
//! these into one observer so delivery order is a property of the
//! channel, not of three independently racing callback invocations.

use crate::agent::AgentInstanceId;
use crate::task::{ExitClass, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    /// The task's execution status changed.
    #[serde(rename = "task:state")]
    State { task_id: TaskId, status: TaskStatus, container_id: Option<String> },

    /// One canonical log line was produced.
    #[serde(rename = "task:log")]
    Log { task_id: TaskId, line: String },

    /// A launch attempt concluded. Fires exactly once per attempt.
    #[serde(rename = "task:done")]
    Done { task_id: TaskId, exit_code: Option<i32>, classification: Option<ExitClass> },

    /// A retry is about to begin, after the given backoff.
    #[serde(rename = "task:retry_attempt")]
    RetryAttempt {
        task_id: TaskId,
        attempt_number: u32,
        agent_id: AgentInstanceId,
        #[serde(with = "duration_millis")]
        backoff: Duration,
    },

    /// The Supervisor fell back from one agent instance to another.
    #[serde(rename = "task:agent_switched")]
    AgentSwitched { task_id: TaskId, from: AgentInstanceId, to: AgentInstanceId },

    /// Finalization reached a terminal state.
    #[serde(rename = "task:finalized")]
    Finalized { task_id: TaskId, success: bool, error: Option<String> },
}

impl TaskEvent {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::State { task_id, .. }
            | Self::Log { task_id, .. }
            | Self::Done { task_id, .. }
            | Self::RetryAttempt { task_id, .. }
            | Self::AgentSwitched { task_id, .. }
            | Self::Finalized { task_id, .. } => *task_id,
        }
    }

    /// Short label for structured logging, independent of the full payload.
    pub fn name(&self) -> &'static str {
        match self {
            Self::State { .. } => "task:state",
            Self::Log { .. } => "task:log",
            Self::Done { .. } => "task:done",
            Self::RetryAttempt { .. } => "task:retry_attempt",
            Self::AgentSwitched { .. } => "task:agent_switched",
            Self::Finalized { .. } => "task:finalized",
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_millis().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
