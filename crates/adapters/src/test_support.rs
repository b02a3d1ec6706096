// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for exercising the engine and daemon without a real
//! container runtime. Gated behind the `test-support` feature so production
//! builds never link this code.

use crate::driver::{ContainerDriver, DriverError, ExecOptions, ExecOutput, LogLine};
use arn_core::container::{ContainerSpec, ContainerState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub spec: ContainerSpec,
    pub state: ContainerState,
    pub log_lines: Vec<String>,
}

/// A scripted, in-memory stand-in for [`ContainerDriver`]. Tests seed it
/// with the exit code / state a container should reach, then assert the
/// supervisor reacted correctly.
#[derive(Default, Clone)]
pub struct FakeDriver {
    containers: Arc<Mutex<HashMap<String, FakeContainer>>>,
    images: Arc<Mutex<std::collections::HashSet<String>>>,
    next_id: Arc<Mutex<u64>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_image(&self, image: &str) {
        self.images.lock().insert(image.to_string());
    }

    pub fn set_exit_code(&self, container_id: &str, code: i32) {
        if let Some(c) = self.containers.lock().get_mut(container_id) {
            c.state.status = "exited".into();
            c.state.exit_code = Some(code);
        }
    }

    pub fn push_log(&self, container_id: &str, line: impl Into<String>) {
        if let Some(c) = self.containers.lock().get_mut(container_id) {
            c.log_lines.push(line.into());
        }
    }

    pub fn container(&self, container_id: &str) -> Option<FakeContainer> {
        self.containers.lock().get(container_id).cloned()
    }
}

#[async_trait]
impl ContainerDriver for FakeDriver {
    async fn pull(&self, image: &str, _platform: Option<&str>) -> Result<(), DriverError> {
        self.images.lock().insert(image.to_string());
        Ok(())
    }

    async fn has_image(&self, image: &str, _platform: Option<&str>) -> Result<bool, DriverError> {
        Ok(self.images.lock().contains(image))
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<String, DriverError> {
        let mut next_id = self.next_id.lock();
        *next_id += 1;
        let id = format!("fake-{:08x}", *next_id);
        drop(next_id);

        let state = ContainerState {
            status: "running".into(),
            started_at: Some(chrono::Utc::now()),
            finished_at: None,
            exit_code: None,
            oom_killed: false,
        };
        self.containers.lock().insert(id.clone(), FakeContainer { spec: spec.clone(), state, log_lines: vec![] });
        Ok(id)
    }

    async fn exec(
        &self,
        container_id: &str,
        _argv: &[String],
        _opts: ExecOptions,
    ) -> Result<ExecOutput, DriverError> {
        if !self.containers.lock().contains_key(container_id) {
            return Err(DriverError::NoSuchContainer(container_id.to_string()));
        }
        Ok(ExecOutput { stdout: String::new(), stderr: String::new(), exit_code: 0 })
    }

    async fn logs_follow(
        &self,
        container_id: &str,
        _tail: Option<usize>,
    ) -> Result<mpsc::Receiver<LogLine>, DriverError> {
        let lines = self
            .containers
            .lock()
            .get(container_id)
            .ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?
            .log_lines
            .clone();
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            let _ = tx.send(LogLine { stream: crate::driver::LogStream::Stdout, line }).await;
        }
        Ok(rx)
    }

    async fn inspect_state(&self, container_id: &str) -> Result<ContainerState, DriverError> {
        self.containers
            .lock()
            .get(container_id)
            .map(|c| c.state.clone())
            .ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))
    }

    async fn wait(&self, container_id: &str) -> Result<i32, DriverError> {
        self.containers
            .lock()
            .get(container_id)
            .and_then(|c| c.state.exit_code)
            .ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))
    }

    async fn pause(&self, container_id: &str) -> Result<(), DriverError> {
        let mut containers = self.containers.lock();
        let c = containers.get_mut(container_id).ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?;
        c.state.status = "paused".into();
        Ok(())
    }

    async fn unpause(&self, container_id: &str) -> Result<(), DriverError> {
        let mut containers = self.containers.lock();
        let c = containers.get_mut(container_id).ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?;
        c.state.status = "running".into();
        Ok(())
    }

    async fn stop(&self, container_id: &str, _grace: Duration) -> Result<(), DriverError> {
        let mut containers = self.containers.lock();
        let c = containers.get_mut(container_id).ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?;
        c.state.status = "exited".into();
        c.state.exit_code.get_or_insert(0);
        c.state.finished_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn kill(&self, container_id: &str) -> Result<(), DriverError> {
        let mut containers = self.containers.lock();
        let c = containers.get_mut(container_id).ok_or_else(|| DriverError::NoSuchContainer(container_id.to_string()))?;
        c.state.status = "exited".into();
        c.state.exit_code = Some(137);
        c.state.finished_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn rm(&self, container_id: &str, _force: bool) -> Result<(), DriverError> {
        self.containers.lock().remove(container_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
