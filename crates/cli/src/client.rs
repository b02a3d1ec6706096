// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: resolves the control socket, speaks the line-delimited
//! JSON protocol, and maps each request to its expected response variant.

use arn_core::environment::EnvironmentId;
use arn_core::task::{Task, TaskId};
use arn_wire::{read_line_json, write_line_json, Request, Response, WireError};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::mpsc;

const STATE_DIR_ENV: &str = "ARN_STATE_DIR";

/// Resolve the data directory the same way `arnd` does, so the CLI finds
/// the socket a locally running daemon actually bound.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(STATE_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".midoriai").join("agents-runner")
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("arnd is not running (no socket at {0})")]
    DaemonNotRunning(PathBuf),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("arnd rejected the request: {0}")]
    Rejected(String),
    #[error("unexpected response from arnd")]
    UnexpectedResponse,
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to an already-running `arnd`. This crate never auto-starts
    /// the daemon — `arnd` is a separately managed long-running process.
    pub async fn connect() -> Result<Self, ClientError> {
        let socket_path = resolve_data_dir().join("arnd.sock");
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }
        Ok(Self { socket_path })
    }

    async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(WireError::from)?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_line_json(&mut write_half, request).await?;
        match read_line_json(&mut reader).await? {
            Some(response) => Ok(response),
            None => Err(WireError::ConnectionClosed.into()),
        }
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Self::reject(other),
        }
    }

    pub async fn submit(&self, environment_id: EnvironmentId, prompt: String) -> Result<Task, ClientError> {
        match self.send(&Request::Submit { environment_id, prompt }).await? {
            Response::Submitted { task } => Ok(task),
            other => Self::reject(other),
        }
    }

    pub async fn status(&self, task_id: TaskId) -> Result<Task, ClientError> {
        match self.send(&Request::Status { task_id }).await? {
            Response::Task { task } => Ok(task),
            other => Self::reject(other),
        }
    }

    pub async fn list(&self, environment_id: Option<EnvironmentId>, active_only: bool) -> Result<Vec<Task>, ClientError> {
        match self.send(&Request::List { environment_id, active_only }).await? {
            Response::Tasks { tasks } => Ok(tasks),
            other => Self::reject(other),
        }
    }

    /// Fetch a task's current snapshot without subscribing to further
    /// events (`arn logs <id>` without `--follow`).
    pub async fn logs_snapshot(&self, task_id: TaskId) -> Result<Task, ClientError> {
        match self.send(&Request::Logs { task_id, follow: false }).await? {
            Response::Task { task } => Ok(task),
            other => Self::reject(other),
        }
    }

    /// Open a `Logs { follow: true }` connection: returns the task's
    /// snapshot plus a channel fed by a background reader task that decodes
    /// every subsequent `Response::Event` line until the connection closes
    /// (normally after `task:finalized`).
    pub async fn logs_follow(&self, task_id: TaskId) -> Result<(Task, mpsc::Receiver<arn_core::event::TaskEvent>), ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(WireError::from)?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_line_json(&mut write_half, &Request::Logs { task_id, follow: true }).await?;
        let task = match read_line_json(&mut reader).await? {
            Some(Response::Task { task }) => task,
            Some(other) => return Self::reject(other),
            None => return Err(WireError::ConnectionClosed.into()),
        };

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(async move {
            loop {
                match read_line_json::<_, Response>(&mut reader).await {
                    Ok(Some(Response::Event { event })) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(_)) | Ok(None) | Err(_) => break,
                }
            }
        });
        Ok((task, rx))
    }

    pub async fn stop(&self, task_id: TaskId) -> Result<(), ClientError> {
        self.send_ok(&Request::Stop { task_id }).await
    }

    pub async fn kill(&self, task_id: TaskId) -> Result<(), ClientError> {
        self.send_ok(&Request::Kill { task_id }).await
    }

    async fn send_ok(&self, request: &Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            other => Self::reject(other),
        }
    }

    fn reject<T>(response: Response) -> Result<T, ClientError> {
        match response {
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
