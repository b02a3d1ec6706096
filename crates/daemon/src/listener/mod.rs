// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-socket listener: accepts connections on `<data_dir>/arnd.sock`
//! and dispatches line-delimited JSON requests against the shared
//! [`Runtime`]. Each connection is handled on its own spawned task so a
//! slow or stalled client never blocks another.

mod handlers;

use crate::runtime::Runtime;
use arn_core::event::TaskEvent;
use arn_wire::{read_line_json, write_line_json, Request, Response, WireError};
use std::sync::Arc;
use tokio::io::{AsyncWrite, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

/// Bind the control socket and accept connections until the process exits.
/// Any stale socket file (left behind by a prior crash) is removed first;
/// a live listener using that path would have refused the bind instead.
pub async fn run(runtime: Arc<Runtime>) -> std::io::Result<()> {
    let socket_path = runtime.data_dir.join("arnd.sock");
    if socket_path.exists() {
        let _ = std::fs::remove_file(&socket_path);
    }
    if let Some(parent) = socket_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let listener = UnixListener::bind(&socket_path)?;
    tracing::info!(path = %socket_path.display(), "control socket listening");

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let runtime = Arc::clone(&runtime);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, runtime).await {
                        tracing::debug!(error = %e, "connection ended");
                    }
                });
            }
            Err(e) => tracing::error!(error = %e, "accept failed"),
        }
    }
}

async fn handle_connection(stream: UnixStream, runtime: Arc<Runtime>) -> Result<(), WireError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let request: Request = match read_line_json(&mut reader).await? {
            Some(req) => req,
            None => return Ok(()),
        };
        tracing::debug!(?request, "received request");

        if let Request::Logs { task_id, follow: true } = request {
            stream_logs(&runtime, task_id, &mut write_half).await?;
            continue;
        }

        let response = handlers::dispatch(&runtime, request).await;
        write_line_json(&mut write_half, &response).await?;
    }
}

/// Send the task's current snapshot, then — if it's still active — keep
/// pushing `task:log`/other events until `task:finalized` arrives or the
/// client disconnects.
async fn stream_logs<W: AsyncWrite + Unpin>(
    runtime: &Runtime,
    task_id: arn_core::task::TaskId,
    writer: &mut W,
) -> Result<(), WireError> {
    let Some(task) = runtime.task(task_id) else {
        return write_line_json(writer, &Response::Error { message: format!("unknown task {task_id}") }).await;
    };
    let still_active = task.status.is_active();
    write_line_json(writer, &Response::Task { task }).await?;
    if !still_active {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(256);
    runtime.subscribe(task_id, tx);

    while let Some(event) = rx.recv().await {
        let finalized = matches!(event, TaskEvent::Finalized { .. });
        write_line_json(writer, &Response::Event { event }).await?;
        if finalized {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
