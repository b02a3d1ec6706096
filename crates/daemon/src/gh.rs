// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `gh`-backed [`PrOpener`], the real implementation behind the Finalizer's
//! abstracted PR-creation seam.

use arn_engine::finalizer::PrOpener;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

const GH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GhPrOpener;

#[async_trait]
impl PrOpener for GhPrOpener {
    async fn open_pr(&self, repo_root: &Path, branch: &str, base: &str, title: &str, body: &str) -> Result<String, String> {
        let output = tokio::time::timeout(
            GH_TIMEOUT,
            tokio::process::Command::new("gh")
                .args(["pr", "create", "--head", branch, "--base", base, "--title", title, "--body", body])
                .current_dir(repo_root)
                .output(),
        )
        .await
        .map_err(|_| "gh pr create timed out".to_string())?
        .map_err(|e| format!("failed to exec gh: {e}"))?;

        if !output.status.success() {
            return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if url.is_empty() {
            return Err("gh pr create produced no URL".to_string());
        }
        Ok(url)
    }
}

#[cfg(test)]
#[path = "gh_tests.rs"]
mod tests;
