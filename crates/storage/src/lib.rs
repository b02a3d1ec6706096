// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence (C11): `state.toml` for settings/environments/agent watch
//! state, per-task TOML files under `tasks/`, and a content-addressed
//! artifact store. Every write goes through a temp-file-then-rename so a
//! crash never leaves a record half-written.

// Allow panic!/unwrap/expect in test code.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod artifacts;
mod atomic;
pub mod state;
pub mod tasks;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize to toml: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to persist temp file: {0}")]
    Persist(String),
}
