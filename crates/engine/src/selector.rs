// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent Selector (C8).
//!
//! Cursor state is per-environment and guarded by a single mutex-protected
//! map, matching the Shared Resource Policy's treatment of Selector
//! cursors as process-wide shared state.

use arn_core::agent::{AgentInstance, AgentInstanceId, AgentSelection, SelectionMode};
use arn_core::environment::EnvironmentId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A rate-limit cooldown window recorded against one agent instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Cooldown {
    pub until: DateTime<Utc>,
    pub reason: String,
}

#[derive(Default)]
pub struct Selector {
    cursors: Mutex<HashMap<EnvironmentId, usize>>,
    cooldowns: Mutex<HashMap<AgentInstanceId, Cooldown>>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `agent_id` hit a rate limit and should be skipped by
    /// selection until `until`.
    pub fn record_rate_limit(&self, agent_id: AgentInstanceId, until: DateTime<Utc>, reason: impl Into<String>) {
        self.cooldowns.lock().insert(agent_id, Cooldown { until, reason: reason.into() });
    }

    /// Whether `agent_id` is still within a recorded cooldown window at `now`.
    pub fn is_in_cooldown(&self, agent_id: AgentInstanceId, now: DateTime<Utc>) -> bool {
        self.cooldowns.lock().get(&agent_id).is_some_and(|c| c.until > now)
    }

    /// Snapshot of all recorded cooldowns, for persistence.
    pub fn cooldown_snapshot(&self) -> Vec<(AgentInstanceId, Cooldown)> {
        self.cooldowns.lock().iter().map(|(id, c)| (*id, c.clone())).collect()
    }

    /// Restore cooldowns loaded from persistence, replacing any in-memory state.
    pub fn restore_cooldowns(&self, entries: impl IntoIterator<Item = (AgentInstanceId, Cooldown)>) {
        *self.cooldowns.lock() = entries.into_iter().collect();
    }

    /// Pick the next agent instance for `env_id` without mutating any
    /// cursor. `active_counts` maps agent_id -> count of currently active
    /// tasks in this environment, used only by `least-used`. Agents still
    /// within a recorded rate-limit cooldown are skipped, falling through
    /// to the next candidate; admission fails if none are eligible.
    pub fn peek(
        &self,
        env_id: EnvironmentId,
        selection: &AgentSelection,
        active_counts: &HashMap<AgentInstanceId, usize>,
        now: DateTime<Utc>,
    ) -> Option<AgentInstance> {
        if selection.is_empty() {
            return None;
        }
        let cooldowns = self.cooldowns.lock();
        let eligible = |a: &AgentInstance| !cooldowns.get(&a.agent_id).is_some_and(|c| c.until > now);
        match selection.selection_mode {
            SelectionMode::RoundRobin => {
                let len = selection.agents.len();
                let cursor = *self.cursors.lock().get(&env_id).unwrap_or(&0);
                (0..len).map(|offset| &selection.agents[(cursor + offset) % len]).find(|a| eligible(a)).cloned()
            }
            SelectionMode::LeastUsed => selection
                .agents
                .iter()
                .filter(|a| eligible(a))
                .min_by_key(|a| active_counts.get(&a.agent_id).copied().unwrap_or(0))
                .cloned(),
            SelectionMode::Fallback => selection.agents.iter().find(|a| eligible(a)).cloned(),
        }
    }

    /// Commit to the agent `peek` would currently return for round-robin
    /// mode, advancing the cursor. Call only once a launch actually
    /// started. No-op for other modes.
    pub fn commit(&self, env_id: EnvironmentId, selection: &AgentSelection) {
        if selection.selection_mode != SelectionMode::RoundRobin || selection.is_empty() {
            return;
        }
        let mut cursors = self.cursors.lock();
        let cursor = cursors.entry(env_id).or_insert(0);
        *cursor = (*cursor + 1) % selection.agents.len();
    }

    /// Compute the fallback hop for `current` per `agent_fallbacks`. Returns
    /// `None` if there is no configured hop or the hop target is itself
    /// still in cooldown.
    pub fn fallback_next_hop(&self, selection: &AgentSelection, current: AgentInstanceId, now: DateTime<Utc>) -> Option<AgentInstance> {
        let next_id = selection.agent_fallbacks.get(&current)?;
        let candidate = selection.find(*next_id)?;
        if self.is_in_cooldown(candidate.agent_id, now) {
            return None;
        }
        Some(candidate.clone())
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
