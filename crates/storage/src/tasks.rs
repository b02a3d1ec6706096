// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence (C11) — the per-task file half. Each task lives in its own
//! TOML file under `tasks/`, moved to `tasks/done/` on archival so active
//! and historical reads never compete for the same directory listing.

use crate::atomic::write_atomic;
use crate::PersistError;
use arn_core::task::Task;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const TASKS_DIR_NAME: &str = "tasks";
const TASKS_DONE_DIR_NAME: &str = "done";

pub fn tasks_root_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(TASKS_DIR_NAME)
}

pub fn tasks_done_dir(data_dir: &Path) -> PathBuf {
    tasks_root_dir(data_dir).join(TASKS_DONE_DIR_NAME)
}

pub async fn ensure_task_dirs(data_dir: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
    let root = tasks_root_dir(data_dir);
    let done = tasks_done_dir(data_dir);
    tokio::fs::create_dir_all(&root).await?;
    tokio::fs::create_dir_all(&done).await?;
    Ok((root, done))
}

fn nanos_now() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0)
}

fn safe_task_filename(task_id: &str) -> String {
    let cleaned: String = task_id.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_').collect();
    let cleaned = if cleaned.is_empty() { format!("task-{}", nanos_now()) } else { cleaned };
    format!("{cleaned}.toml")
}

pub fn task_path(data_dir: &Path, task_id: &str, archived: bool) -> PathBuf {
    let folder = if archived { tasks_done_dir(data_dir) } else { tasks_root_dir(data_dir) };
    folder.join(safe_task_filename(task_id))
}

/// Atomically write `task`'s current state to its active or archived file.
pub async fn save_task(data_dir: &Path, task: &Task, archived: bool) -> Result<(), PersistError> {
    ensure_task_dirs(data_dir).await?;
    let path = task_path(data_dir, task.task_id.as_str(), archived);
    let text = toml::to_string_pretty(task)?;
    write_atomic(&path, text.as_bytes()).await
}

/// Move a task's active file into `tasks/done/` once it has reached a
/// terminal state and finalization is done. On a name collision (a done
/// file for this task id already exists from an earlier run) the active
/// file is renamed aside with a nanosecond-suffixed name instead of being
/// overwritten, so a record is never silently lost.
pub async fn archive_active_task_file(data_dir: &Path, task_id: &str) -> std::io::Result<()> {
    let active_path = task_path(data_dir, task_id, false);
    if tokio::fs::metadata(&active_path).await.is_err() {
        return Ok(());
    }
    ensure_task_dirs(data_dir).await?;
    let done_path = task_path(data_dir, task_id, true);
    if tokio::fs::metadata(&done_path).await.is_ok() {
        let stem = done_path.file_stem().and_then(|s| s.to_str()).unwrap_or("task");
        let dedup_path = tasks_done_dir(data_dir).join(format!("{stem}.dup-{}.toml", nanos_now()));
        let _ = tokio::fs::rename(&active_path, &dedup_path).await;
        return Ok(());
    }
    let _ = tokio::fs::rename(&active_path, &done_path).await;
    Ok(())
}

pub async fn load_task(data_dir: &Path, task_id: &str, archived: bool) -> Option<Task> {
    let path = task_path(data_dir, task_id, archived);
    let text = tokio::fs::read_to_string(&path).await.ok()?;
    toml::from_str(&text).ok()
}

/// All active (non-archived) tasks, in filename order.
pub async fn load_active_tasks(data_dir: &Path) -> std::io::Result<Vec<Task>> {
    let mut names = list_toml_files(&tasks_root_dir(data_dir)).await?;
    names.sort();
    let mut out = Vec::new();
    for path in names {
        if let Ok(text) = tokio::fs::read_to_string(&path).await {
            if let Ok(task) = toml::from_str::<Task>(&text) {
                out.push(task);
            }
        }
    }
    Ok(out)
}

/// Most-recently-modified archived tasks, paginated `offset..offset+limit`.
pub async fn load_done_tasks(data_dir: &Path, offset: usize, limit: usize) -> std::io::Result<Vec<Task>> {
    let paths = list_toml_files(&tasks_done_dir(data_dir)).await?;
    let mut dated = Vec::with_capacity(paths.len());
    for path in paths {
        let modified = tokio::fs::metadata(&path).await.and_then(|m| m.modified()).unwrap_or(UNIX_EPOCH);
        dated.push((modified, path));
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = Vec::new();
    for (_, path) in dated.into_iter().skip(offset).take(limit.max(1)) {
        if let Ok(text) = tokio::fs::read_to_string(&path).await {
            if let Ok(task) = toml::from_str::<Task>(&text) {
                out.push(task);
            }
        }
    }
    Ok(out)
}

async fn list_toml_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && entry.file_name().to_string_lossy().ends_with(".toml") {
            out.push(entry.path());
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
