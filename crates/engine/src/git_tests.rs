// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;
use tokio::process::Command;

async fn git(args: &[&str], cwd: &Path) {
    let status = Command::new("git").args(args).current_dir(cwd).status().await.unwrap();
    assert!(status.success(), "git {args:?} failed");
}

async fn init_repo_with_commit() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(&["init", "-q"], dir.path()).await;
    git(&["config", "user.email", "test@example.com"], dir.path()).await;
    git(&["config", "user.name", "Test"], dir.path()).await;
    tokio::fs::write(dir.path().join("README.md"), b"hello").await.unwrap();
    git(&["add", "."], dir.path()).await;
    git(&["commit", "-q", "-m", "initial"], dir.path()).await;
    dir
}

#[tokio::test]
async fn validate_mounted_accepts_a_writable_directory() {
    let dir = TempDir::new().unwrap();
    assert!(validate_mounted(dir.path()).await.is_ok());
}

#[tokio::test]
async fn validate_mounted_rejects_a_missing_path() {
    let err = validate_mounted(Path::new("/definitely/not/real/xyz")).await.unwrap_err();
    assert!(matches!(err, GitError::NotReadWrite(_)));
}

#[tokio::test]
async fn ensure_cloned_clones_from_a_local_remote() {
    let remote = init_repo_with_commit().await;
    let dest_parent = TempDir::new().unwrap();
    let dest = dest_parent.path().join("clone");

    ensure_cloned(&dest, &remote.path().display().to_string(), false).await.unwrap();
    assert!(dest.join("README.md").exists());
}

#[tokio::test]
async fn ensure_cloned_fetches_when_already_present() {
    let remote = init_repo_with_commit().await;
    let dest_parent = TempDir::new().unwrap();
    let dest = dest_parent.path().join("clone");
    ensure_cloned(&dest, &remote.path().display().to_string(), false).await.unwrap();

    // Second call should fetch, not fail, against the now-existing clone.
    ensure_cloned(&dest, &remote.path().display().to_string(), false).await.unwrap();
}

#[tokio::test]
async fn ensure_cloned_refuses_non_repo_dir_without_recreate() {
    let remote = init_repo_with_commit().await;
    let dest_parent = TempDir::new().unwrap();
    let dest = dest_parent.path().join("clone");
    tokio::fs::create_dir_all(&dest).await.unwrap();
    tokio::fs::write(dest.join("stray.txt"), b"x").await.unwrap();

    let err = ensure_cloned(&dest, &remote.path().display().to_string(), false).await.unwrap_err();
    assert!(matches!(err, GitError::WorktreeConflict(_)));
}

#[tokio::test]
async fn ensure_cloned_recreates_when_requested() {
    let remote = init_repo_with_commit().await;
    let dest_parent = TempDir::new().unwrap();
    let dest = dest_parent.path().join("clone");
    tokio::fs::create_dir_all(&dest).await.unwrap();
    tokio::fs::write(dest.join("stray.txt"), b"x").await.unwrap();

    ensure_cloned(&dest, &remote.path().display().to_string(), true).await.unwrap();
    assert!(dest.join("README.md").exists());
}

#[tokio::test]
async fn prepare_task_branch_creates_branch_from_explicit_base() {
    let remote = init_repo_with_commit().await;
    git(&["branch", "-M", "main"], remote.path()).await;
    let dest_parent = TempDir::new().unwrap();
    let dest = dest_parent.path().join("clone");
    ensure_cloned(&dest, &remote.path().display().to_string(), false).await.unwrap();

    let prepared = prepare_task_branch(&dest, "task-abc123", Some("main")).await.unwrap();
    assert_eq!(prepared.branch, "agents-runner-task-abc123");
    assert_eq!(prepared.base_branch, "main");
}

#[test]
fn branch_name_is_namespaced_by_task() {
    assert_eq!(branch_name_for_task("task-xyz"), "agents-runner-task-xyz");
}

#[test]
fn noop_only_for_none_workspace_type() {
    assert!(noop_for_workspace_type(WorkspaceType::None));
    assert!(!noop_for_workspace_type(WorkspaceType::Mounted));
    assert!(!noop_for_workspace_type(WorkspaceType::Cloned));
}

#[tokio::test]
async fn remove_workspace_refuses_paths_without_tasks_component() {
    let dir = TempDir::new().unwrap();
    let err = remove_workspace(dir.path()).await.unwrap_err();
    assert!(matches!(err, GitError::RepoUnreachable(_)));
}

#[tokio::test]
async fn remove_workspace_refuses_symlinks() {
    let parent = TempDir::new().unwrap();
    let real_dir = parent.path().join("tasks").join("task-1").join("repo");
    tokio::fs::create_dir_all(&real_dir).await.unwrap();
    let link = parent.path().join("tasks").join("task-1").join("repo-link");
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&real_dir, &link).unwrap();
        let err = remove_workspace(&link).await.unwrap_err();
        assert!(matches!(err, GitError::RepoUnreachable(_)));
    }
}

#[tokio::test]
async fn remove_workspace_deletes_a_valid_task_directory() {
    let parent = TempDir::new().unwrap();
    let real_dir = parent.path().join("tasks").join("task-1").join("repo");
    tokio::fs::create_dir_all(&real_dir).await.unwrap();
    remove_workspace(&real_dir).await.unwrap();
    assert!(!real_dir.exists());
}
