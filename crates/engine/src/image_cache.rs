// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image Cache (C6).
//!
//! A layered build keyed by content hashes of the scripts that feed each
//! layer. Builds are serialized process-wide with a mutex so two tasks
//! racing to prepare the same environment don't launch redundant builds.
//! A failed layer build is skipped, not fatal — its script simply re-runs
//! at container start via the Preflight Compiler.

use arn_adapters::{ContainerDriver, DriverError};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const LAYER_BUILD_TIMEOUT: Duration = Duration::from_secs(900);
const DESKTOP_BUILD_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerName {
    System,
    Desktop,
    Settings,
    Environment,
}

impl LayerName {
    fn tag_prefix(&self) -> &'static str {
        match self {
            LayerName::System => "agent-runner-phase-system",
            LayerName::Desktop => "agent-runner-desktop",
            LayerName::Settings => "agent-runner-phase-settings",
            LayerName::Environment => "agent-runner-env",
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            LayerName::Desktop => DESKTOP_BUILD_TIMEOUT,
            _ => LAYER_BUILD_TIMEOUT,
        }
    }
}

/// The inputs that determine a layer's cache key. An empty `script` makes
/// the layer a pass-through: its tag is just the previous layer's image.
#[derive(Debug, Clone, Default)]
pub struct LayerInputs {
    pub script: Option<String>,
    pub extra_hash_inputs: Vec<String>,
}

fn content_hash(previous_image: &str, inputs: &LayerInputs) -> String {
    let mut hasher = Sha256::new();
    hasher.update(previous_image.as_bytes());
    if let Some(script) = &inputs.script {
        hasher.update(script.as_bytes());
    }
    for extra in &inputs.extra_hash_inputs {
        hasher.update(extra.as_bytes());
    }
    let digest = hasher.finalize();
    hex16(&digest)
}

fn hex16(bytes: &[u8]) -> String {
    bytes.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("layer build failed: {0}")]
pub struct LayerBuildFailed(pub String);

/// Process-wide serialization of image builds, so concurrent task launches
/// sharing an environment don't kick off redundant builds for the same tag.
pub struct ImageCache<D: ContainerDriver> {
    driver: Arc<D>,
    build_lock: Mutex<()>,
}

impl<D: ContainerDriver> ImageCache<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver, build_lock: Mutex::new(()) }
    }

    /// Build (or reuse) one layer on top of `previous_image`. Returns the
    /// previous image unchanged, tagged as pass-through, when the layer
    /// has no script. On build failure returns `Ok` with the previous
    /// image and logs the failure — callers must still execute the
    /// layer's script at runtime via the Preflight Compiler.
    pub async fn build_layer(
        &self,
        previous_image: &str,
        layer: LayerName,
        inputs: &LayerInputs,
        dockerfile: impl Fn(&str) -> String,
    ) -> Result<String, LayerBuildFailed> {
        if inputs.script.as_deref().unwrap_or("").trim().is_empty() {
            return Ok(previous_image.to_string());
        }

        let tag = format!("{}:{}", layer.tag_prefix(), content_hash(previous_image, inputs));

        let _guard = self.build_lock.lock().await;

        match self.driver.has_image(&tag, None).await {
            Ok(true) => return Ok(tag),
            Ok(false) => {}
            Err(_) => {}
        }

        let dockerfile_content = dockerfile(previous_image);
        let result = tokio::time::timeout(layer.timeout(), self.build_with_dockerfile(&tag, &dockerfile_content)).await;

        match result {
            Ok(Ok(())) => Ok(tag),
            Ok(Err(e)) => {
                tracing::warn!(layer = ?layer, error = %e, "layer build failed, skipping (will run at container start)");
                Ok(previous_image.to_string())
            }
            Err(_) => {
                tracing::warn!(layer = ?layer, "layer build timed out, skipping");
                Ok(previous_image.to_string())
            }
        }
    }

    async fn build_with_dockerfile(&self, tag: &str, dockerfile: &str) -> Result<(), DriverError> {
        use tokio::io::AsyncWriteExt;

        let binary = std::env::var("ARN_CONTAINER_BINARY").unwrap_or_else(|_| "docker".into());
        let mut child = tokio::process::Command::new(&binary)
            .args(["build", "-t", tag, "-f", "-", "."])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| DriverError::Other(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(dockerfile.as_bytes()).await;
        }

        let output = child.wait_with_output().await.map_err(|e| DriverError::Other(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DriverError::Other(String::from_utf8_lossy(&output.stderr).trim().to_string()))
        }
    }
}

#[cfg(test)]
#[path = "image_cache_tests.rs"]
mod tests;
