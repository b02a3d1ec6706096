// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared temp-file-then-rename write helper, used by both `state.rs` and
//! `tasks.rs` so every on-disk record is written atomically.

use crate::PersistError;
use std::path::Path;

/// Write `contents` to `path` by creating a sibling temp file in the same
/// directory (so the final rename is same-filesystem and atomic) and
/// renaming it into place.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PersistError> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    tokio::fs::write(tmp.path(), contents).await?;
    tmp.persist(path).map_err(|e| PersistError::Persist(e.to_string()))?;
    Ok(())
}
