// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use arn_core::environment::EnvironmentId;
use arn_core::task::TaskId;
use serde::{Deserialize, Serialize};

/// Request from `arn` (the CLI) to `arnd` over the control socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check.
    Ping,

    /// Submit a new task against an environment.
    Submit { environment_id: EnvironmentId, prompt: String },

    /// Fetch one task's current snapshot.
    Status { task_id: TaskId },

    /// List tasks, optionally filtered to one environment or to active tasks only.
    List {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        environment_id: Option<EnvironmentId>,
        #[serde(default)]
        active_only: bool,
    },

    /// Stream a task's log lines. When `follow` is set, the connection stays
    /// open and subsequent `task:log` events are pushed until the task's
    /// `task:finalized` event or the client disconnects.
    Logs {
        task_id: TaskId,
        #[serde(default)]
        follow: bool,
    },

    /// Request cooperative cancellation: the task transitions to `cancelled`
    /// and the container is stopped with the usual grace period.
    Stop { task_id: TaskId },

    /// Force-terminate a task's container immediately.
    Kill { task_id: TaskId },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
