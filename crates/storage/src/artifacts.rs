// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed artifact store backing [`arn_engine::finalizer::ArtifactStore`].
//! Each staged file is hashed, copied under `artifacts/<env>/<hash>/<name>`,
//! and deduplicated for free: re-storing identical bytes is a no-op copy.

use arn_engine::finalizer::ArtifactStore;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn env_dir(&self, environment_id: &str) -> PathBuf {
        self.root.join(environment_id)
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn store_file(&self, environment_id: &str, path: &Path) -> std::io::Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = hex(&hasher.finalize());

        let file_name = path.file_name().map(|n| n.to_owned()).unwrap_or_else(|| "artifact".into());
        let dest_dir = self.env_dir(environment_id).join(&hash);
        tokio::fs::create_dir_all(&dest_dir).await?;
        let dest_path = dest_dir.join(&file_name);
        if tokio::fs::metadata(&dest_path).await.is_err() {
            tokio::fs::write(&dest_path, &bytes).await?;
        }
        Ok(hash)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
