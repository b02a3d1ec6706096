// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The engine: everything that turns a queued [`arn_core::task::Task`] into
//! a running container and back down into a finalized one. Composes the
//! Workspace Resolver (C3), Git Workspace Manager (C4), Preflight Compiler
//! (C5), Image Cache (C6), Agent Selector (C8) and Task Supervisor (C9) on
//! top of the adapters crate's Container Driver and Agent Plugin Registry.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod finalizer;
pub mod git;
pub mod image_cache;
pub mod preflight;
pub mod resolver;
pub mod selector;
pub mod supervisor;

pub use finalizer::{FinalizeError, Finalizer};
pub use image_cache::{ImageCache, LayerBuildFailed, LayerInputs, LayerName};
pub use resolver::{resolve_workspace_mount, ResolvedMount, UnsafeMount};
pub use selector::{Cooldown, Selector};
pub use supervisor::{
    classify_exit, AdmissionController, AttemptOutcome, NextStep, RetryPolicy, RunPlan, Supervisor, SupervisorError,
};
