// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `arnd` — the long-running process that owns every Environment's tasks:
//! plans and supervises container attempts, drives finalization, persists
//! state, and serves the local control socket the CLI talks to.

// Allow panic!/unwrap/expect in test code.
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod executor;
mod gh;
mod listener;
mod recovery;
mod runtime;

use arn_adapters::DockerDriver;
use runtime::Runtime;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "arnd.log";

fn init_logging(data_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = data_dir.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = std::env::var("ARN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = runtime::resolve_data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;
    let _log_guard = init_logging(&data_dir);

    tracing::info!(data_dir = %data_dir.display(), "starting arnd");

    let rt = Arc::new(Runtime::new(data_dir.clone(), DockerDriver::new()));
    rt.load_state().await;

    recovery::recover_at_startup(&rt).await;
    recovery::spawn_periodic_tick(Arc::clone(&rt), recovery::RECOVERY_TICK_INTERVAL);

    listener::run(rt).await?;
    Ok(())
}
