// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The daemon's process-wide context: resolved paths, the wired-together
//! engine components, and the in-memory task/environment maps that back
//! the control socket's queries. Replaces the source's module-level
//! singletons with one context passed explicitly to every component.

use crate::gh::GhPrOpener;
use arn_adapters::DockerDriver;
use arn_core::agent::AgentInstanceId;
use arn_core::environment::{Environment, EnvironmentId};
use arn_core::event::TaskEvent;
use arn_core::task::{Task, TaskId};
use arn_engine::selector::Cooldown;
use arn_engine::{Finalizer, Supervisor};
use arn_storage::artifacts::FileArtifactStore;
use arn_storage::state::{self, Settings, StateFile};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

const STATE_DIR_ENV: &str = "ARN_STATE_DIR";

/// Resolve the daemon's data directory: `ARN_STATE_DIR`, else
/// `~/.midoriai/agents-runner`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".midoriai").join("agents-runner")
}

pub type RuntimeSupervisor = Supervisor<DockerDriver>;
pub type RuntimeFinalizer = Finalizer<FileArtifactStore, GhPrOpener>;

/// Everything one running `arnd` process needs, assembled once at startup.
pub struct Runtime {
    pub data_dir: PathBuf,
    pub supervisor: Arc<RuntimeSupervisor>,
    pub finalizer: Arc<RuntimeFinalizer>,
    pub settings: Mutex<Settings>,
    pub environments: Mutex<HashMap<EnvironmentId, Environment>>,
    pub tasks: Mutex<HashMap<TaskId, Task>>,
    /// Per-task fan-out for `logs --follow` subscribers. Dropped receivers
    /// are pruned lazily on next publish.
    subscribers: Mutex<HashMap<TaskId, Vec<mpsc::Sender<TaskEvent>>>>,
}

impl Runtime {
    pub fn new(data_dir: PathBuf, driver: DockerDriver) -> Self {
        let artifact_store = FileArtifactStore::new(data_dir.join("artifacts"));
        Self {
            data_dir,
            supervisor: Arc::new(Supervisor::new(Arc::new(driver))),
            finalizer: Arc::new(Finalizer::new(artifact_store, GhPrOpener)),
            settings: Mutex::new(Settings::default()),
            environments: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn state_toml_path(&self) -> PathBuf {
        self.data_dir.join("state.toml")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    /// Load `state.toml` (settings, environments, agent cooldowns) into
    /// this runtime. Never fails: a missing or unreadable file leaves
    /// defaults in place, matching [`arn_storage::state::load_state`].
    pub async fn load_state(&self) {
        let loaded = state::load_state(&self.state_toml_path()).await;
        *self.settings.lock() = loaded.settings;
        *self.environments.lock() =
            loaded.environments.into_iter().map(|e| (e.env_id, e)).collect();
        let cooldowns: Vec<(AgentInstanceId, Cooldown)> = loaded
            .agent_watch
            .into_iter()
            .filter_map(|entry| {
                let until = entry.cooldown_until?;
                Some((entry.agent_id, Cooldown { until, reason: entry.cooldown_reason }))
            })
            .collect();
        self.supervisor.restore_cooldowns(cooldowns);
    }

    /// Snapshot this runtime's settings/environments/cooldowns and persist
    /// them atomically.
    pub async fn save_state(&self) -> Result<(), arn_storage::PersistError> {
        let settings = self.settings.lock().clone();
        let environments: Vec<Environment> = self.environments.lock().values().cloned().collect();
        let agent_watch = self
            .supervisor
            .cooldown_snapshot()
            .into_iter()
            .map(|(agent_id, cooldown)| arn_storage::state::AgentWatchEntry {
                agent_id,
                cooldown_until: Some(cooldown.until),
                cooldown_reason: cooldown.reason,
            })
            .collect();
        let file = StateFile { version: state::STATE_VERSION, settings, environments, agent_watch };
        state::save_state(&self.state_toml_path(), &file).await
    }

    pub fn environment(&self, id: EnvironmentId) -> Option<Environment> {
        self.environments.lock().get(&id).cloned()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().get(&id).cloned()
    }

    pub fn list_tasks(&self, environment_id: Option<EnvironmentId>, active_only: bool) -> Vec<Task> {
        self.tasks
            .lock()
            .values()
            .filter(|t| environment_id.is_none_or(|env| t.environment_id == env))
            .filter(|t| !active_only || t.status.is_active())
            .cloned()
            .collect()
    }

    pub fn upsert_task(&self, task: Task) {
        self.tasks.lock().insert(task.task_id, task);
    }

    /// Mutate a tracked task in place, returning its updated clone, or
    /// `None` if `id` is not tracked.
    pub fn update_task<F: FnOnce(&mut Task)>(&self, id: TaskId, f: F) -> Option<Task> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(&id)?;
        f(task);
        Some(task.clone())
    }

    pub fn remove_task(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().remove(&id)
    }

    /// Register a `logs --follow` subscriber for `task_id`.
    pub fn subscribe(&self, task_id: TaskId, sender: mpsc::Sender<TaskEvent>) {
        self.subscribers.lock().entry(task_id).or_default().push(sender);
    }

    /// Fan an event out to every live subscriber for its task, dropping any
    /// that have since disconnected.
    pub fn publish(&self, event: TaskEvent) {
        let task_id = event.task_id();
        let mut subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get_mut(&task_id) {
            senders.retain(|tx| tx.try_send(event.clone()).is_ok());
            if senders.is_empty() {
                subscribers.remove(&task_id);
            }
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
