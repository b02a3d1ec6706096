// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace Resolver (C3).
//!
//! Turns a user-selected host path into a safe mount root plus the
//! in-container working directory. The safety check runs against the
//! *realpath* — symlinks dereferenced — never the lexical path the user
//! typed, because a container will happily mount through a symlink and a
//! lexical check on `/tmp/link` says nothing about where `/tmp/link` points.

use std::path::{Path, PathBuf};

const PROJECT_MARKERS: &[&str] = &[".git", "pyproject.toml"];
const FORBIDDEN_SYSTEM_DIRS: &[&str] = &["/etc", "/var", "/usr", "/opt", "/srv", "/root", "/boot", "/sys", "/proc"];
const MAX_MOUNT_DEPTH: usize = 3;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unsafe mount: {reason}")]
pub struct UnsafeMount {
    pub reason: String,
}

impl UnsafeMount {
    fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMount {
    pub mount_root: PathBuf,
    pub container_cwd: PathBuf,
}

/// Resolve and validate a mount for `requested_path`, with `container_mount_root`
/// as the in-container root the mount root is rebased under (e.g.
/// `/home/midori-ai/workspace`).
pub fn resolve_workspace_mount(
    requested_path: &Path,
    container_mount_root: &Path,
) -> Result<ResolvedMount, UnsafeMount> {
    let expanded = expand_tilde(requested_path);
    let canonical = std::fs::canonicalize(&expanded)
        .map_err(|e| UnsafeMount::new(format!("cannot resolve realpath of {}: {e}", expanded.display())))?;

    let candidate = walk_to_project_root(&canonical);
    check_safety(&candidate, &canonical)?;

    let relative = relative_component_count_path(&candidate, &canonical);
    let container_cwd = container_mount_root.join(relative);

    Ok(ResolvedMount { mount_root: candidate, container_cwd })
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Some(s) = path.to_str() else { return path.to_path_buf() };
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if s == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    path.to_path_buf()
}

/// First climb from `start` to the nearest ancestor (inclusive) carrying a
/// project marker; then keep climbing while each further parent also
/// carries one, so a marker directory nested inside another marker
/// directory still resolves to the outermost root. If no ancestor up to
/// the filesystem root carries a marker, `start` itself is the candidate.
fn walk_to_project_root(start: &Path) -> PathBuf {
    let mut cursor = match nearest_marker_ancestor(start) {
        Some(found) => found,
        None => return start.to_path_buf(),
    };
    loop {
        let Some(parent) = cursor.parent() else { break };
        if has_project_marker(parent) {
            cursor = parent.to_path_buf();
        } else {
            break;
        }
    }
    cursor
}

fn nearest_marker_ancestor(start: &Path) -> Option<PathBuf> {
    let mut cursor = Some(start);
    while let Some(dir) = cursor {
        if has_project_marker(dir) {
            return Some(dir.to_path_buf());
        }
        cursor = dir.parent();
    }
    None
}

fn has_project_marker(dir: &Path) -> bool {
    PROJECT_MARKERS.iter().any(|m| dir.join(m).exists())
}

fn check_safety(candidate: &Path, requested: &Path) -> Result<(), UnsafeMount> {
    if let Some(home) = dirs::home_dir() {
        if paths_equal(candidate, &home) {
            return Err(UnsafeMount::new("mount root equals the user's home directory"));
        }
    }

    if candidate == Path::new("/") {
        return Err(UnsafeMount::new("mount root equals the filesystem root"));
    }

    for forbidden in FORBIDDEN_SYSTEM_DIRS {
        let forbidden = Path::new(forbidden);
        if paths_equal(candidate, forbidden) || candidate.starts_with(forbidden) {
            return Err(UnsafeMount::new(format!(
                "mount root {} is, or descends from, the system directory {}",
                candidate.display(),
                forbidden.display()
            )));
        }
    }

    let depth = relative_component_count(candidate, requested);
    if depth > MAX_MOUNT_DEPTH {
        return Err(UnsafeMount::new(format!(
            "requested path is {depth} directory components below the mount root, exceeding the limit of {MAX_MOUNT_DEPTH}"
        )));
    }

    Ok(())
}

/// Same-file comparison: a symlink cycle that resolves both paths to the
/// same inode is treated as equal even if the lexical forms differ.
fn paths_equal(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => same_file(&ma, &mb),
        _ => false,
    }
}

#[cfg(unix)]
fn same_file(a: &std::fs::Metadata, b: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_a: &std::fs::Metadata, _b: &std::fs::Metadata) -> bool {
    false
}

fn relative_component_count(root: &Path, descendant: &Path) -> usize {
    relative_component_count_path(root, descendant).components().count()
}

fn relative_component_count_path(root: &Path, descendant: &Path) -> PathBuf {
    descendant.strip_prefix(root).map(Path::to_path_buf).unwrap_or_default()
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
