// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use arn_core::event::TaskEvent;
use arn_core::task::Task;
use serde::{Deserialize, Serialize};

/// Response from `arnd` back to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Pong,
    Ok,
    Error {
        message: String,
    },

    /// Answer to `Request::Submit`.
    Submitted {
        task: Task,
    },

    /// Answer to `Request::Status`.
    Task {
        task: Task,
    },

    /// Answer to `Request::List`.
    Tasks {
        tasks: Vec<Task>,
    },

    /// One line pushed over a `Request::Logs { follow: true }` connection,
    /// after the initial response. The same ordered-per-task delivery the
    /// engine guarantees for [`TaskEvent`] is preserved end to end.
    Event {
        event: TaskEvent,
    },
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
