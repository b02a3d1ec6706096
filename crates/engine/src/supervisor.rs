// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task Supervisor (C9) — the engine. Owns the per-task state machine,
//! composes the Driver, Resolver, Git Manager, Preflight Compiler, Image
//! Cache and Selector, and classifies exits into a retry/fallback policy.

use crate::git;
use crate::preflight::{self, PreflightScripts};
use crate::resolver::{self, UnsafeMount};
use crate::selector::Selector;
use arn_adapters::registry::{self, PluginContext};
use arn_adapters::{ContainerDriver, DriverError};
use arn_core::agent::{AgentInstance, AgentInstanceId};
use arn_core::container::{ContainerSpec, Mount};
use arn_core::environment::{Environment, WorkspaceType};
use arn_core::event::TaskEvent;
use arn_core::log_format::{format_log_line, wrap_container_log};
use arn_core::sanitize::sanitize_prompt;
use arn_core::task::{Attempt, ExitClass, Task, TaskId, TaskStatus};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const STOP_GRACE: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(750);

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    UnsafeMount(#[from] UnsafeMount),
    #[error(transparent)]
    Git(#[from] git::GitError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("no agent instance available for this environment")]
    NoAgentAvailable,
    #[error("capacity exceeded for this environment")]
    CapacityExceeded,
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SupervisorError {
    fn from(e: std::io::Error) -> Self {
        SupervisorError::Io(e.to_string())
    }
}

/// Admission control for the process-wide pool, layered on top of
/// [`Environment::admits_more`] which already governs per-environment
/// capacity. `None`/negative means unbounded.
pub struct AdmissionController;

impl AdmissionController {
    pub fn global_admits(active_global: usize, global_max: Option<i64>) -> bool {
        match global_max {
            None => true,
            Some(max) if max < 0 => true,
            Some(max) => (active_global as i64) < max,
        }
    }
}

const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "429", "too many requests", "quota exceeded"];
const AUTH_FAILURE_PATTERNS: &[&str] = &["authentication failed", "invalid api key", "permission denied"];

/// Classify a finished attempt from its exit code, OOM flag, and recent log
/// body. Checked strictly in order: crash, then rate-limit, then
/// auth-fatal, then agent-failure exit codes, then success, else generic
/// retryable.
pub fn classify_exit(exit_code: Option<i32>, oom_killed: bool, log_tail: &str) -> ExitClass {
    if oom_killed || exit_code == Some(137) {
        return ExitClass::ContainerCrash;
    }
    let lower = log_tail.to_ascii_lowercase();
    if RATE_LIMIT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ExitClass::RateLimited;
    }
    if AUTH_FAILURE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ExitClass::Fatal;
    }
    match exit_code {
        Some(126) | Some(127) => ExitClass::AgentFailure,
        Some(0) => ExitClass::Success,
        _ => ExitClass::Retryable,
    }
}

/// Retry/fallback backoff schedule. Attempt numbers are 1-based (the
/// number of the attempt that's *about* to be retried into).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries_per_agent: u32,
    pub standard_backoff: Vec<Duration>,
    pub rate_limit_backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries_per_agent: 0,
            standard_backoff: vec![Duration::from_secs(5), Duration::from_secs(15), Duration::from_secs(45)],
            rate_limit_backoff: vec![Duration::from_secs(60), Duration::from_secs(120), Duration::from_secs(300)],
        }
    }
}

impl RetryPolicy {
    /// Backoff before same-agent retry number `retry_number` (1-based),
    /// or `None` if the policy or the classification disallows it.
    pub fn same_agent_backoff(&self, class: ExitClass, retry_number: u32) -> Option<Duration> {
        if !class.is_retryable_same_agent() || retry_number > self.max_retries_per_agent {
            return None;
        }
        let schedule = match class {
            ExitClass::RateLimited => &self.rate_limit_backoff,
            _ => &self.standard_backoff,
        };
        schedule.get((retry_number as usize).saturating_sub(1)).copied().or_else(|| schedule.last().copied())
    }
}

/// Everything gathered before a container is started.
pub struct RunPlan {
    pub spec: ContainerSpec,
    pub preflight: preflight::CompiledPreflight,
    pub agent_instance: AgentInstance,
    pub gh_repo_root: Option<PathBuf>,
    pub gh_base_branch: Option<String>,
    pub gh_branch: Option<String>,
}

/// The result of one container run, before retry/fallback policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub exit_code: Option<i32>,
    pub classification: ExitClass,
    pub user_requested: StopSignal,
}

/// What the caller should do after an attempt concludes.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    RetrySameAgent { backoff: Duration, attempt_number: u32 },
    Fallback { agent: AgentInstance },
    Finalize,
}

/// Per-task cooperative-cancellation handle.
#[derive(Clone)]
pub struct StopHandle {
    tx: watch::Sender<StopSignal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopSignal {
    #[default]
    None,
    Stop,
    Kill,
}

impl StopHandle {
    pub fn request_stop(&self) {
        let _ = self.tx.send(StopSignal::Stop);
    }

    pub fn request_kill(&self) {
        let _ = self.tx.send(StopSignal::Kill);
    }
}

/// Coordinates launches across tasks, holding one [`StopHandle`] per active
/// task and delegating to the injected Driver for every side effect.
pub struct Supervisor<D: ContainerDriver> {
    driver: Arc<D>,
    selector: Selector,
    stop_handles: Mutex<HashMap<TaskId, StopHandle>>,
}

impl<D: ContainerDriver + 'static> Supervisor<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver, selector: Selector::new(), stop_handles: Mutex::new(HashMap::new()) }
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Snapshot of agent rate-limit cooldowns, for persistence.
    pub fn cooldown_snapshot(&self) -> Vec<(AgentInstanceId, crate::selector::Cooldown)> {
        self.selector.cooldown_snapshot()
    }

    /// Restore agent rate-limit cooldowns loaded from persistence.
    pub fn restore_cooldowns(&self, entries: impl IntoIterator<Item = (AgentInstanceId, crate::selector::Cooldown)>) {
        self.selector.restore_cooldowns(entries);
    }

    /// Build the plan for one launch attempt: select the agent (or reuse
    /// `forced_agent` for a fallback hop), resolve and prepare the
    /// workspace, compile preflight, and assemble the container spec.
    pub async fn plan_attempt(
        &self,
        task: &Task,
        env: &Environment,
        forced_agent: Option<AgentInstanceId>,
        staging_dir: &std::path::Path,
        active_counts: &HashMap<AgentInstanceId, usize>,
    ) -> Result<RunPlan, SupervisorError> {
        let agent_instance = match forced_agent {
            Some(id) => env.agent_selection.find(id).cloned().ok_or(SupervisorError::NoAgentAvailable)?,
            None => self
                .selector
                .peek(env.env_id, &env.agent_selection, active_counts, Utc::now())
                .ok_or(SupervisorError::NoAgentAvailable)?,
        };

        let (gh_repo_root, gh_base_branch, gh_branch) = match env.workspace_type {
            WorkspaceType::Mounted => {
                git::validate_mounted(&task.host_workdir).await?;
                (None, None, None)
            }
            WorkspaceType::Cloned => {
                let dest = task.host_workdir.clone();
                git::ensure_cloned(&dest, &env.workspace_target, true).await?;
                let prepared = git::prepare_task_branch(&dest, task.task_id.as_str(), None).await?;
                (Some(prepared.repo_root), Some(prepared.base_branch), Some(prepared.branch))
            }
            WorkspaceType::None => (None, None, None),
        };

        let mount_root = resolver::resolve_workspace_mount(&task.host_workdir, Path::new(registry::CONTAINER_WORKDIR))?;

        let plugin_ctx = PluginContext {
            workspace_host: mount_root.mount_root.clone(),
            workspace_container: mount_root.container_cwd.clone(),
            config_host: agent_instance.config_dir.clone().unwrap_or_default(),
            config_container: registry::container_config_dir(&agent_instance.agent_cli),
            workspace_is_non_git: !mount_root.mount_root.join(".git").exists(),
        };

        let sanitized_prompt = sanitize_prompt(&task.prompt);
        let argv = registry::build_noninteractive_argv(&agent_instance.agent_cli, &sanitized_prompt, &[], &plugin_ctx);

        let compiled = preflight::compile(
            task.task_id.as_str(),
            &PreflightScripts { environment: env.preflight_script.clone(), ..Default::default() },
            &agent_instance.agent_cli,
        )
        .await?;

        let mut mounts = vec![Mount::rw(mount_root.mount_root.clone(), mount_root.container_cwd.clone())];
        mounts.extend(compiled.mounts.clone());
        mounts.push(preflight::artifact_staging_mount(staging_dir));
        mounts.extend(env.extra_mounts.clone());
        if let Some(config_dir) = &agent_instance.config_dir {
            mounts.extend(registry::additional_config_mounts(&agent_instance.agent_cli, config_dir));
        }

        let mut env_vars: Vec<(String, String)> = env.env_vars.clone().into_iter().collect();
        if registry::requires_github_token(&agent_instance.agent_cli) || env.gh_context_enabled {
            if let Some(token) = arn_adapters::resolve_github_token("github.com").await {
                env_vars.push(("GH_TOKEN".into(), token.clone()));
                env_vars.push(("GITHUB_TOKEN".into(), token));
            }
        }

        let entrypoint_argv = vec![
            "/bin/bash".to_string(),
            "-lc".to_string(),
            format!("{}; exec {}", compiled.prelude, shell_join(&argv)),
        ];

        let spec = ContainerSpec {
            image: task.image.clone(),
            name: format!("arn-task-{}", task.task_id.short(8)),
            workdir: mount_root.container_cwd,
            env: env_vars,
            mounts,
            platform: arn_adapters::forced_platform(),
            ports: vec![],
            tty: false,
            argv: entrypoint_argv,
            keepalive_argv: None,
        };

        Ok(RunPlan { spec, preflight: compiled, agent_instance, gh_repo_root, gh_base_branch, gh_branch })
    }

    /// Start the container for `plan` and spawn the log-follow and
    /// state-poll loops, emitting [`TaskEvent`]s to `events` until the
    /// attempt concludes.
    pub async fn run_attempt(
        &self,
        task_id: TaskId,
        plan: &RunPlan,
        events: mpsc::Sender<TaskEvent>,
    ) -> Result<AttemptOutcome, SupervisorError> {
        if !self.driver.has_image(&plan.spec.image, plan.spec.platform.as_deref()).await.unwrap_or(false) {
            self.driver.pull(&plan.spec.image, plan.spec.platform.as_deref()).await?;
        }

        let _ = events.send(TaskEvent::State { task_id, status: TaskStatus::Starting, container_id: None }).await;
        let container_id = self.driver.run(&plan.spec).await?;
        let _ = events
            .send(TaskEvent::State { task_id, status: TaskStatus::Running, container_id: Some(container_id.clone()) })
            .await;

        self.watch_container(task_id, container_id, Vec::new(), events).await
    }

    /// Re-attach to a container that was already running when the process
    /// started, for a task recovered from persisted state. Skips the pull
    /// and run steps entirely; if the container has already exited by the
    /// time we look, the outcome is reported immediately with no polling.
    pub async fn reattach_attempt(
        &self,
        task_id: TaskId,
        container_id: &str,
        events: mpsc::Sender<TaskEvent>,
    ) -> Result<AttemptOutcome, SupervisorError> {
        let state = self.driver.inspect_state(container_id).await?;
        if state.is_exited() {
            let classification = classify_exit(state.exit_code, state.oom_killed, "");
            let outcome = AttemptOutcome { exit_code: state.exit_code, classification, user_requested: StopSignal::None };
            let _ = events
                .send(TaskEvent::Done { task_id, exit_code: outcome.exit_code, classification: Some(outcome.classification) })
                .await;
            return Ok(outcome);
        }
        let _ = events
            .send(TaskEvent::State { task_id, status: TaskStatus::Running, container_id: Some(container_id.to_string()) })
            .await;
        self.watch_container(task_id, container_id.to_string(), Vec::new(), events).await
    }

    /// Shared log-follow / state-poll / stop-signal loop, used by both a
    /// fresh launch and a recovery re-attach once a container is known to
    /// exist and be running.
    async fn watch_container(
        &self,
        task_id: TaskId,
        container_id: String,
        mut log_lines: Vec<String>,
        events: mpsc::Sender<TaskEvent>,
    ) -> Result<AttemptOutcome, SupervisorError> {
        let (stop_tx, mut stop_rx) = watch::channel(StopSignal::None);
        self.stop_handles.lock().insert(task_id, StopHandle { tx: stop_tx });

        let mut logs_rx = self.driver.logs_follow(&container_id, Some(200)).await?;
        let cid4 = container_id.chars().take(4).collect::<String>();
        let mut requested: StopSignal = StopSignal::None;

        let outcome = loop {
            tokio::select! {
                maybe_line = logs_rx.recv() => {
                    if let Some(line) = maybe_line {
                        let stream = match line.stream {
                            arn_adapters::LogStream::Stdout => "stdout",
                            arn_adapters::LogStream::Stderr => "stderr",
                        };
                        let wrapped = wrap_container_log(&cid4, stream, &line.line);
                        log_lines.push(wrapped.clone());
                        let _ = events.send(TaskEvent::Log { task_id, line: wrapped }).await;
                    }
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    let state = self.driver.inspect_state(&container_id).await?;
                    if state.is_exited() {
                        let tail = log_lines.iter().rev().take(200).cloned().collect::<Vec<_>>().join("\n");
                        let classification = classify_exit(state.exit_code, state.oom_killed, &tail);
                        break AttemptOutcome { exit_code: state.exit_code, classification, user_requested: requested };
                    }
                }
                changed = stop_rx.changed() => {
                    if changed.is_ok() {
                        requested = *stop_rx.borrow();
                        match requested {
                            StopSignal::Stop => {
                                let _ = events.send(TaskEvent::Log { task_id, line: format_log_line("supervisor", "control", "INFO", "user_cancel: stopping container") }).await;
                                if self.driver.stop(&container_id, STOP_GRACE).await.is_err() {
                                    let _ = self.driver.kill(&container_id).await;
                                }
                            }
                            StopSignal::Kill => {
                                let _ = self.driver.kill(&container_id).await;
                            }
                            StopSignal::None => {}
                        }
                    }
                }
            }
        };

        self.stop_handles.lock().remove(&task_id);
        let _ = events
            .send(TaskEvent::Done { task_id, exit_code: outcome.exit_code, classification: Some(outcome.classification) })
            .await;
        Ok(outcome)
    }

    /// Decide what happens after `outcome`, given the attempt history so
    /// far. A user-requested stop/kill always finalizes regardless of
    /// classification — cancellation is not retried.
    pub fn decide_next_step(
        &self,
        env: &Environment,
        current_agent: AgentInstanceId,
        outcome: &AttemptOutcome,
        retries_on_current_agent: u32,
        retry_policy: &RetryPolicy,
    ) -> NextStep {
        if outcome.classification == ExitClass::RateLimited {
            let cooldown = retry_policy.rate_limit_backoff.last().copied().unwrap_or(Duration::from_secs(60));
            let until = Utc::now() + chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::zero());
            self.selector.record_rate_limit(current_agent, until, "rate_limited");
        }
        if outcome.user_requested != StopSignal::None {
            return NextStep::Finalize;
        }
        if outcome.classification == ExitClass::Success {
            return NextStep::Finalize;
        }
        let next_retry = retries_on_current_agent + 1;
        if let Some(backoff) = retry_policy.same_agent_backoff(outcome.classification, next_retry) {
            return NextStep::RetrySameAgent { backoff, attempt_number: next_retry };
        }
        if outcome.classification.allows_fallback() {
            if env.agent_selection.selection_mode == arn_core::agent::SelectionMode::Fallback {
                if let Some(next) = self.selector.fallback_next_hop(&env.agent_selection, current_agent, Utc::now()) {
                    return NextStep::Fallback { agent: next };
                }
            }
        }
        NextStep::Finalize
    }

    /// Append `outcome` to `task.attempt_history` as a finished attempt.
    pub fn record_attempt(&self, task: &mut Task, agent_id: AgentInstanceId, started_at: chrono::DateTime<Utc>, outcome: &AttemptOutcome) {
        task.attempt_history.push(Attempt {
            agent_id,
            started_at,
            finished_at: Some(Utc::now()),
            exit_code: outcome.exit_code,
            classification: Some(outcome.classification),
        });
    }

    /// True if the driver still knows about this container id. Used by the
    /// recovery loop to tell a surviving container apart from one that
    /// disappeared while the daemon was down.
    pub async fn container_exists(&self, container_id: &str) -> bool {
        self.driver.inspect_state(container_id).await.is_ok()
    }

    pub fn stop_handle(&self, task_id: TaskId) -> Option<StopHandle> {
        self.stop_handles.lock().get(&task_id).cloned()
    }

    pub async fn request_stop(&self, task_id: TaskId) {
        if let Some(handle) = self.stop_handle(task_id) {
            handle.request_stop();
        }
    }

    pub async fn request_kill(&self, task_id: TaskId) {
        if let Some(handle) = self.stop_handle(task_id) {
            handle.request_kill();
        }
    }
}

fn shell_join(argv: &[String]) -> String {
    argv.iter().map(|a| shell_quote(a)).collect::<Vec<_>>().join(" ")
}

fn shell_quote(arg: &str) -> String {
    if arg.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.' | ':')) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
