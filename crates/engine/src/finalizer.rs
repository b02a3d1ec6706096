// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finalizer (C10) — the post-exit pipeline: artifact drain, optional PR
//! creation, workspace cleanup. Triggered once a task reaches a terminal
//! execution status with `finalization_state == pending`.
//!
//! Idempotence is enforced by two independent guards, checked in order:
//! an in-memory `task_id -> worker` map (refuses a second concurrent
//! worker for the same task) and the task's own `finalization_state`
//! (refuses when already `running` or `done`). Either guard alone would
//! be sufficient on a single process; both are kept because the second
//! is what survives a restart.

use crate::git;
use arn_core::task::{FinalizationState, Task};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_ARTIFACT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("finalization already in progress for this task")]
    AlreadyRunning,
    #[error("artifact store error: {0}")]
    ArtifactStore(String),
    #[error("PR creation failed: {0}")]
    PrCreation(String),
    #[error(transparent)]
    Git(#[from] git::GitError),
}

/// One drained artifact: its content hash and the relative path it was
/// staged under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainedArtifact {
    pub content_hash: String,
    pub staged_relative_path: PathBuf,
}

/// Per-environment content-addressed artifact storage. Implemented by
/// `arn-storage`; abstracted here so the Finalizer doesn't depend on the
/// storage crate's on-disk layout.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store_file(&self, environment_id: &str, path: &Path) -> std::io::Result<String>;
}

/// Opens a pull request for a finished cloned-workspace task. Implemented
/// by an adapter shelling out to `gh`; abstracted here for the same
/// reason as [`ArtifactStore`].
#[async_trait]
pub trait PrOpener: Send + Sync {
    async fn open_pr(&self, repo_root: &Path, branch: &str, base: &str, title: &str, body: &str) -> Result<String, String>;
}

/// Context for one finalization run, assembled by the caller from the
/// task and its owning environment.
pub struct FinalizeContext<'a> {
    pub environment_id: &'a str,
    pub staging_dir: &'a Path,
    pub artifact_drain_timeout: Duration,
    /// True when this finalization was triggered by the recovery loop's
    /// periodic tick rather than a fresh exit, in which case workspace
    /// cleanup is skipped to avoid racing a separately issued cleanup.
    pub is_recovery_triggered: bool,
}

impl<'a> FinalizeContext<'a> {
    pub fn new(environment_id: &'a str, staging_dir: &'a Path) -> Self {
        Self { environment_id, staging_dir, artifact_drain_timeout: DEFAULT_ARTIFACT_DRAIN_TIMEOUT, is_recovery_triggered: false }
    }
}

/// Runs the finalization pipeline for terminal tasks, guarding against
/// duplicate concurrent or cross-restart workers.
pub struct Finalizer<S: ArtifactStore, P: PrOpener> {
    artifact_store: S,
    pr_opener: P,
    active_workers: Mutex<HashSet<String>>,
}

impl<S: ArtifactStore, P: PrOpener> Finalizer<S, P> {
    pub fn new(artifact_store: S, pr_opener: P) -> Self {
        Self { artifact_store, pr_opener, active_workers: Mutex::new(HashSet::new()) }
    }

    /// Claim `task_id` for finalization. Returns `false` if a worker is
    /// already registered in-memory or the task's own state says work is
    /// already running or done.
    pub fn try_claim(&self, task: &Task) -> bool {
        if matches!(task.finalization_state, FinalizationState::Running | FinalizationState::Done) {
            return false;
        }
        self.active_workers.lock().insert(task.task_id.as_str().to_string())
    }

    fn release(&self, task_id: &str) {
        self.active_workers.lock().remove(task_id);
    }

    /// Run the full pipeline for `task`, mutating its finalization fields
    /// and (on success, for cloned workspaces) its `gh_pr_url`. Always
    /// releases the in-memory claim on return, including on error.
    pub async fn finalize(&self, task: &mut Task, ctx: &FinalizeContext<'_>) -> Result<(), FinalizeError> {
        let task_id = task.task_id.as_str().to_string();
        if !self.try_claim(task) {
            return Err(FinalizeError::AlreadyRunning);
        }
        task.finalization_state = FinalizationState::Running;

        let result = self.run_pipeline(task, ctx).await;
        match &result {
            Ok(()) => {
                task.finalization_state = FinalizationState::Done;
                task.finalization_error = None;
            }
            Err(e) => {
                task.finalization_state = FinalizationState::Error;
                task.finalization_error = Some(e.to_string());
            }
        }
        self.release(&task_id);
        result
    }

    async fn run_pipeline(&self, task: &mut Task, ctx: &FinalizeContext<'_>) -> Result<(), FinalizeError> {
        let user_stopped = matches!(task.status, arn_core::task::TaskStatus::Cancelled | arn_core::task::TaskStatus::Killed);

        if !user_stopped {
            self.drain_artifacts(task, ctx).await;
        } else {
            tracing::info!(task_id = %task.task_id, "skipping artifact drain for a user-stopped task");
        }

        if !user_stopped && task.gh_pr_url.is_none() {
            self.maybe_open_pr(task).await?;
        }

        if !ctx.is_recovery_triggered && task.workspace_type == arn_core::environment::WorkspaceType::Cloned {
            if let Some(repo_root) = &task.gh_repo_root {
                git::remove_workspace(repo_root).await?;
            }
        }

        Ok(())
    }

    /// Content-hash and store every file under the staging directory,
    /// appending each resulting ID to `task.artifacts`. Best-effort: a
    /// timeout or per-file store failure is logged at WARN and does not
    /// fail finalization — a drain timeout is partial success, not an
    /// error.
    async fn drain_artifacts(&self, task: &mut Task, ctx: &FinalizeContext<'_>) {
        let deadline = tokio::time::Instant::now() + ctx.artifact_drain_timeout;
        let files = match list_staged_files(ctx.staging_dir).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(task_id = %task.task_id, error = %e, "could not read staging directory");
                return;
            }
        };

        for file in files {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(task_id = %task.task_id, "artifact drain timed out, remaining files skipped");
                break;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            match tokio::time::timeout(remaining, self.artifact_store.store_file(ctx.environment_id, &file)).await {
                Ok(Ok(id)) => task.artifacts.push(id),
                Ok(Err(e)) => tracing::warn!(task_id = %task.task_id, file = %file.display(), error = %e, "failed to store artifact"),
                Err(_) => {
                    tracing::warn!(task_id = %task.task_id, "artifact drain timed out, remaining files skipped");
                    break;
                }
            }
        }
    }

    /// Open a PR for a cloned-workspace task whose branch exists and has
    /// no PR yet. No-op for any other workspace type.
    async fn maybe_open_pr(&self, task: &mut Task) -> Result<(), FinalizeError> {
        if task.workspace_type != arn_core::environment::WorkspaceType::Cloned {
            return Ok(());
        }
        let (Some(repo_root), Some(branch), Some(base)) = (&task.gh_repo_root, &task.gh_branch, &task.gh_base_branch) else {
            return Ok(());
        };

        git::push_branch(repo_root, branch).await?;

        let title = pr_title(&task.prompt);
        let body = pr_body(task);
        let url = self
            .pr_opener
            .open_pr(repo_root, branch, base, &title, &body)
            .await
            .map_err(FinalizeError::PrCreation)?;
        task.gh_pr_url = Some(url);
        Ok(())
    }
}

async fn list_staged_files(staging_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(staging_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}

fn pr_title(prompt: &str) -> String {
    prompt
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("Agent runner task")
        .to_string()
}

fn pr_body(task: &Task) -> String {
    let mut body = format!("{}\n\n---\n\nAttempts:\n", task.prompt);
    for (i, attempt) in task.attempt_history.iter().enumerate() {
        body.push_str(&format!(
            "{}. agent={} exit_code={:?} classification={:?}\n",
            i + 1,
            attempt.agent_id,
            attempt.exit_code,
            attempt.classification,
        ));
    }
    body
}

#[cfg(test)]
#[path = "finalizer_tests.rs"]
mod tests;
