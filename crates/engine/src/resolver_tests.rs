// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use tempfile::TempDir;

const MOUNT_ROOT: &str = "/home/midori-ai/workspace";

fn make_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".git")).unwrap();
    dir
}

#[test]
fn resolves_project_root_itself() {
    let repo = make_repo();
    let result = resolve_workspace_mount(repo.path(), Path::new(MOUNT_ROOT)).unwrap();
    assert_eq!(result.mount_root, std::fs::canonicalize(repo.path()).unwrap());
    assert_eq!(result.container_cwd, Path::new(MOUNT_ROOT));
}

#[test]
fn nested_path_mounts_project_root_and_keeps_relative_workdir() {
    let repo = make_repo();
    let nested = repo.path().join("src").join("tests");
    fs::create_dir_all(&nested).unwrap();

    let result = resolve_workspace_mount(&nested, Path::new(MOUNT_ROOT)).unwrap();
    assert_eq!(result.mount_root, std::fs::canonicalize(repo.path()).unwrap());
    assert_eq!(result.container_cwd, Path::new(MOUNT_ROOT).join("src").join("tests"));
}

#[test]
fn depth_three_allowed_depth_four_rejected() {
    let repo = make_repo();
    let depth3 = repo.path().join("a").join("b").join("c");
    fs::create_dir_all(&depth3).unwrap();
    assert!(resolve_workspace_mount(&depth3, Path::new(MOUNT_ROOT)).is_ok());

    let depth4 = depth3.join("d");
    fs::create_dir_all(&depth4).unwrap();
    let err = resolve_workspace_mount(&depth4, Path::new(MOUNT_ROOT)).unwrap_err();
    assert!(err.reason.contains("exceeding"));
}

#[test]
fn no_marker_anywhere_mounts_the_requested_directory_exactly() {
    let dir = TempDir::new().unwrap();
    let result = resolve_workspace_mount(dir.path(), Path::new(MOUNT_ROOT)).unwrap();
    assert_eq!(result.mount_root, std::fs::canonicalize(dir.path()).unwrap());
}

#[test]
fn rejects_home_directory_mount() {
    let home = dirs::home_dir().unwrap();
    let err = resolve_workspace_mount(&home, Path::new(MOUNT_ROOT)).unwrap_err();
    assert!(err.reason.contains("home directory"));
}

#[test]
fn rejects_filesystem_root() {
    let err = resolve_workspace_mount(Path::new("/"), Path::new(MOUNT_ROOT)).unwrap_err();
    assert!(err.reason.contains("filesystem root"));
}

#[test]
fn rejects_system_directory_descendant() {
    if Path::new("/etc").exists() {
        let err = resolve_workspace_mount(Path::new("/etc"), Path::new(MOUNT_ROOT)).unwrap_err();
        assert!(err.reason.contains("/etc"));
    }
}

#[test]
fn rejects_symlink_into_home() {
    let home = dirs::home_dir().unwrap();
    let tmp = TempDir::new().unwrap();
    let link = tmp.path().join("link-to-home");
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&home, &link).unwrap();
        let err = resolve_workspace_mount(&link, Path::new(MOUNT_ROOT)).unwrap_err();
        assert!(err.reason.contains("home directory"));
    }
}

#[test]
fn rejects_symlink_into_root() {
    let tmp = TempDir::new().unwrap();
    let link = tmp.path().join("link-to-root");
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink("/", &link).unwrap();
        let err = resolve_workspace_mount(&link, Path::new(MOUNT_ROOT)).unwrap_err();
        assert!(err.reason.contains("filesystem root"));
    }
}

#[test]
fn expand_tilde_resolves_to_home() {
    let home = dirs::home_dir().unwrap();
    let expanded = expand_tilde(Path::new("~"));
    assert_eq!(expanded, home);
}

#[test]
fn nonexistent_path_fails_to_resolve() {
    let err = resolve_workspace_mount(Path::new("/definitely/does/not/exist/xyz"), Path::new(MOUNT_ROOT));
    assert!(err.is_err());
}
