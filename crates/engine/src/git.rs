// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git Workspace Manager (C4).
//!
//! Mounted workspaces are validated in place; cloned workspaces are
//! materialized at a data-dir-local path and branched per task.

use arn_core::environment::WorkspaceType;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

const GIT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("workspace path is not readable and writable: {0}")]
    NotReadWrite(String),
    #[error("repository unreachable: {0}")]
    RepoUnreachable(String),
    #[error("authentication required: {0}")]
    AuthRequired(String),
    #[error("base branch missing: {0}")]
    BaseBranchMissing(String),
    #[error("worktree conflict: {0}")]
    WorktreeConflict(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedWorkspace {
    pub repo_root: PathBuf,
    pub base_branch: String,
    pub branch: String,
}

async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<String, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    cmd.env_remove("GIT_DIR");
    cmd.env_remove("GIT_WORK_TREE");

    let output = tokio::time::timeout(GIT_TIMEOUT, cmd.output())
        .await
        .map_err(|_| GitError::RepoUnreachable(format!("git {} timed out", args.join(" "))))?
        .map_err(|e| GitError::RepoUnreachable(e.to_string()))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_git_error(&stderr))
    }
}

fn classify_git_error(stderr: &str) -> GitError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("authentication failed") || lower.contains("permission denied") || lower.contains("could not read username") {
        GitError::AuthRequired(stderr.to_string())
    } else if lower.contains("couldn't find remote ref") || lower.contains("unknown revision") {
        GitError::BaseBranchMissing(stderr.to_string())
    } else if lower.contains("already exists") || lower.contains("is already checked out") {
        GitError::WorktreeConflict(stderr.to_string())
    } else {
        GitError::RepoUnreachable(stderr.to_string())
    }
}

/// Validate a mounted workspace without cloning anything.
pub async fn validate_mounted(path: &Path) -> Result<(), GitError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| GitError::NotReadWrite(format!("{}: {e}", path.display())))?;
    if !meta.is_dir() {
        return Err(GitError::NotReadWrite(format!("{} is not a directory", path.display())));
    }
    let probe = path.join(format!(".arn-write-probe-{}", std::process::id()));
    tokio::fs::write(&probe, b"").await.map_err(|e| GitError::NotReadWrite(format!("{}: {e}", path.display())))?;
    let _ = tokio::fs::remove_file(&probe).await;
    Ok(())
}

/// Ensure a cloned working tree exists at `dest`, cloning or fetching as
/// needed. `recreate_if_needed` forces a wipe-and-reclone when `dest`
/// exists but is not a valid git working tree.
pub async fn ensure_cloned(dest: &Path, remote: &str, recreate_if_needed: bool) -> Result<(), GitError> {
    let exists = tokio::fs::metadata(dest).await.is_ok();
    let is_repo = exists && run_git(&["rev-parse", "--git-dir"], Some(dest)).await.is_ok();

    if exists && !is_repo {
        if !recreate_if_needed {
            return Err(GitError::WorktreeConflict(format!("{} exists and is not a git working tree", dest.display())));
        }
        tokio::fs::remove_dir_all(dest).await.map_err(|e| GitError::RepoUnreachable(e.to_string()))?;
    }

    if !is_repo || !exists {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| GitError::RepoUnreachable(e.to_string()))?;
        }
        run_git(&["clone", remote, &dest.display().to_string()], None).await?;
    } else {
        run_git(&["fetch", "--all", "--prune"], Some(dest)).await?;
    }
    Ok(())
}

/// Create and check out a per-task branch from `base_branch` (or the
/// remote's default branch when unset).
pub async fn prepare_task_branch(
    repo_root: &Path,
    task_id: &str,
    base_branch: Option<&str>,
) -> Result<PreparedWorkspace, GitError> {
    let base = match base_branch {
        Some(b) if !b.trim().is_empty() => b.trim().to_string(),
        _ => remote_default_branch(repo_root).await?,
    };

    run_git(&["fetch", "origin", &base], Some(repo_root)).await.map_err(|e| match e {
        GitError::RepoUnreachable(msg) => GitError::BaseBranchMissing(msg),
        other => other,
    })?;

    let branch = format!("agents-runner-{task_id}");
    run_git(&["checkout", "-B", &branch, &format!("origin/{base}")], Some(repo_root)).await?;

    Ok(PreparedWorkspace { repo_root: repo_root.to_path_buf(), base_branch: base, branch })
}

async fn remote_default_branch(repo_root: &Path) -> Result<String, GitError> {
    let out = run_git(&["symbolic-ref", "refs/remotes/origin/HEAD"], Some(repo_root)).await?;
    out.rsplit('/').next().map(str::to_string).ok_or_else(|| GitError::BaseBranchMissing("no remote HEAD".into()))
}

/// Push `branch` to `origin` so a PR can reference it.
pub async fn push_branch(repo_root: &Path, branch: &str) -> Result<(), GitError> {
    run_git(&["push", "-u", "origin", branch], Some(repo_root)).await.map(|_| ())
}

/// Remove a cloned working tree directory.
///
/// Refuses to remove a symlink, and refuses any path that doesn't contain
/// a `tasks` component, to guard against configuration errors deleting an
/// unrelated directory.
pub async fn remove_workspace(path: &Path) -> Result<(), GitError> {
    if !path.components().any(|c| c.as_os_str() == "tasks") {
        return Err(GitError::RepoUnreachable(format!("refusing to remove non-task path {}", path.display())));
    }
    if let Ok(meta) = tokio::fs::symlink_metadata(path).await {
        if meta.file_type().is_symlink() {
            return Err(GitError::RepoUnreachable(format!("refusing to remove symlink {}", path.display())));
        }
    } else {
        return Ok(());
    }
    tokio::fs::remove_dir_all(path).await.map_err(|e| GitError::RepoUnreachable(e.to_string()))
}

pub fn branch_name_for_task(task_id: &str) -> String {
    format!("agents-runner-{task_id}")
}

pub fn noop_for_workspace_type(workspace_type: WorkspaceType) -> bool {
    workspace_type == WorkspaceType::None
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
