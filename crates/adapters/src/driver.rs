// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container Driver (C1) — a typed wrapper over the OCI CLI (`docker`, kept
//! compatible with a `podman`-class binary). No daemon socket is touched
//! directly; every operation shells out to the configured binary.

use arn_core::container::{ContainerSpec, ContainerState, Mount};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("image unavailable: {0}")]
    ImageUnavailable(String),
    #[error("no such container: {0}")]
    NoSuchContainer(String),
    #[error("container exec failed: {0}")]
    ExecFailed(String),
    #[error("driver operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

/// Output of a foreground `exec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub tty: bool,
    pub interactive: bool,
    pub cwd: Option<PathBuf>,
}

/// One line of container log output, already identified by stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stream: LogStream,
    pub line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Typed access to the container runtime. All operations are safe to call
/// concurrently for different container IDs; same-ID concurrency is the
/// caller's responsibility.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    async fn pull(&self, image: &str, platform: Option<&str>) -> Result<(), DriverError>;

    /// True iff the image digest matches the requested platform architecture.
    async fn has_image(&self, image: &str, platform: Option<&str>) -> Result<bool, DriverError>;

    async fn run(&self, spec: &ContainerSpec) -> Result<String, DriverError>;

    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        opts: ExecOptions,
    ) -> Result<ExecOutput, DriverError>;

    /// Start a lazy, restartable log-follow stream. Returns a receiver fed
    /// by a background task; dropping the receiver cancels the follow
    /// within one poll interval.
    async fn logs_follow(
        &self,
        container_id: &str,
        tail: Option<usize>,
    ) -> Result<mpsc::Receiver<LogLine>, DriverError>;

    async fn inspect_state(&self, container_id: &str) -> Result<ContainerState, DriverError>;

    async fn wait(&self, container_id: &str) -> Result<i32, DriverError>;

    async fn pause(&self, container_id: &str) -> Result<(), DriverError>;
    async fn unpause(&self, container_id: &str) -> Result<(), DriverError>;
    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), DriverError>;
    async fn kill(&self, container_id: &str) -> Result<(), DriverError>;

    /// Swallows "no such container" and returns success.
    async fn rm(&self, container_id: &str, force: bool) -> Result<(), DriverError>;
}

/// `docker`-CLI-backed implementation.
pub struct DockerDriver {
    binary: String,
}

impl Default for DockerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerDriver {
    pub fn new() -> Self {
        Self { binary: std::env::var("ARN_CONTAINER_BINARY").unwrap_or_else(|_| "docker".into()) }
    }

    async fn run_cli(&self, args: &[&str]) -> Result<String, DriverError> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| DriverError::Other(format!("failed to exec {}: {e}", self.binary)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(classify_cli_error(args, &stderr))
        }
    }
}

fn classify_cli_error(args: &[&str], stderr: &str) -> DriverError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("no such container") {
        DriverError::NoSuchContainer(stderr.to_string())
    } else if args.first() == Some(&"pull")
        || lower.contains("not found")
        || lower.contains("unauthorized")
        || lower.contains("manifest unknown")
    {
        DriverError::ImageUnavailable(stderr.to_string())
    } else {
        DriverError::Other(format!("{} failed: {stderr}", args.first().unwrap_or(&"")))
    }
}

fn platform_args(platform: Option<&str>) -> Vec<String> {
    platform.map(|p| vec![format!("--platform={p}")]).unwrap_or_default()
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn pull(&self, image: &str, platform: Option<&str>) -> Result<(), DriverError> {
        let mut args = vec!["pull".to_string()];
        args.extend(platform_args(platform));
        args.push(image.to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_cli(&arg_refs).await?;
        Ok(())
    }

    async fn has_image(&self, image: &str, platform: Option<&str>) -> Result<bool, DriverError> {
        let format = "{{.Architecture}}";
        let result = self.run_cli(&["image", "inspect", image, "--format", format]).await;
        let arch = match result {
            Ok(arch) => arch,
            Err(DriverError::Other(_)) | Err(DriverError::ImageUnavailable(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let Some(wanted) = platform.and_then(|p| p.split('/').nth(1)) else {
            return Ok(true);
        };
        Ok(arch.eq_ignore_ascii_case(wanted))
    }

    async fn run(&self, spec: &ContainerSpec) -> Result<String, DriverError> {
        let mut args: Vec<String> = vec!["run".into(), "-d".into(), "--name".into(), spec.name.clone()];
        args.extend(platform_args(spec.platform.as_deref()));
        for (host, container) in &spec.ports {
            args.push("-p".into());
            args.push(format!("{host}:{container}"));
        }
        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{key}={value}"));
        }
        for mount in &spec.mounts {
            args.push("-v".into());
            let ro = if mount.read_only { ":ro" } else { "" };
            args.push(format!("{}:{}{ro}", mount.host.display(), mount.container.display()));
        }
        args.push("-w".into());
        args.push(spec.workdir.display().to_string());
        if spec.tty {
            args.push("-t".into());
        }
        args.push(spec.image.clone());
        args.extend(spec.keepalive_argv.clone().unwrap_or_else(|| spec.argv.clone()));

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_cli(&arg_refs).await
    }

    async fn exec(
        &self,
        container_id: &str,
        argv: &[String],
        opts: ExecOptions,
    ) -> Result<ExecOutput, DriverError> {
        let mut args: Vec<String> = vec!["exec".into()];
        if opts.interactive {
            args.push("-i".into());
        }
        if opts.tty {
            args.push("-t".into());
        }
        if let Some(cwd) = &opts.cwd {
            args.push("-w".into());
            args.push(cwd.display().to_string());
        }
        args.push(container_id.into());
        args.extend(argv.iter().cloned());

        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(&args);
        let output = cmd.output().await.map_err(|e| DriverError::ExecFailed(e.to_string()))?;
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn logs_follow(
        &self,
        container_id: &str,
        tail: Option<usize>,
    ) -> Result<mpsc::Receiver<LogLine>, DriverError> {
        let tail_arg = tail.map(|n| n.to_string()).unwrap_or_else(|| "all".into());
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(["logs", "-f", "--tail", &tail_arg, container_id]);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        let mut child = cmd.spawn().map_err(|e| DriverError::Other(e.to_string()))?;

        let stdout = child.stdout.take().ok_or_else(|| DriverError::Other("no stdout pipe".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| DriverError::Other("no stderr pipe".into()))?;

        let (tx, rx) = mpsc::channel(256);
        let tx_out = tx.clone();
        tokio::spawn(async move {
            use tokio::io::{AsyncBufReadExt, BufReader};
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx_out.send(LogLine { stream: LogStream::Stdout, line }).await.is_err() {
                    break;
                }
            }
        });
        tokio::spawn(async move {
            use tokio::io::{AsyncBufReadExt, BufReader};
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(LogLine { stream: LogStream::Stderr, line }).await.is_err() {
                    break;
                }
            }
        });
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(rx)
    }

    async fn inspect_state(&self, container_id: &str) -> Result<ContainerState, DriverError> {
        let format = "{{.State.Status}}\t{{.State.StartedAt}}\t{{.State.FinishedAt}}\t{{.State.ExitCode}}\t{{.State.OOMKilled}}";
        let output = self.run_cli(&["inspect", container_id, "--format", format]).await?;
        parse_inspect_line(&output)
            .ok_or_else(|| DriverError::Other(format!("unparseable inspect output: {output}")))
    }

    async fn wait(&self, container_id: &str) -> Result<i32, DriverError> {
        let output = self.run_cli(&["wait", container_id]).await?;
        output.trim().parse().map_err(|_| DriverError::Other(format!("unparseable exit code: {output}")))
    }

    async fn pause(&self, container_id: &str) -> Result<(), DriverError> {
        self.run_cli(&["pause", container_id]).await.map(|_| ())
    }

    async fn unpause(&self, container_id: &str) -> Result<(), DriverError> {
        self.run_cli(&["unpause", container_id]).await.map(|_| ())
    }

    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), DriverError> {
        self.run_cli(&["stop", "--time", &grace.as_secs().to_string(), container_id]).await.map(|_| ())
    }

    async fn kill(&self, container_id: &str) -> Result<(), DriverError> {
        self.run_cli(&["kill", container_id]).await.map(|_| ())
    }

    async fn rm(&self, container_id: &str, force: bool) -> Result<(), DriverError> {
        let mut args = vec!["rm"];
        if force {
            args.push("-f");
        }
        args.push(container_id);
        match self.run_cli(&args).await {
            Ok(_) => Ok(()),
            Err(DriverError::NoSuchContainer(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn parse_inspect_line(line: &str) -> Option<ContainerState> {
    let mut parts = line.splitn(5, '\t');
    let status = parts.next()?.to_ascii_lowercase();
    let started_at = parts.next().and_then(parse_docker_time);
    let finished_at = parts.next().and_then(parse_docker_time);
    let exit_code = parts.next().and_then(|s| s.parse().ok());
    let oom_killed = parts.next().map(|s| s.trim() == "true").unwrap_or(false);
    Some(ContainerState { status, started_at, finished_at, exit_code, oom_killed })
}

fn parse_docker_time(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("0001-01-01") {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
