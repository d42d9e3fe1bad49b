//! `streamdl serve` – host the queue until Ctrl-C/SIGTERM.
//!
//! Job events are printed to stdout as JSON lines for whatever drives the
//! server (a browser extension host, a status bar, a terminal).

use anyhow::{Context, Result};
use std::sync::Arc;
use streamdl_core::config::QueueConfig;
use streamdl_core::control::default_control_socket_path;
use streamdl_core::queue::QueueManager;
use streamdl_core::store::QueueStore;
use streamdl_core::supervisor::ProcessLauncher;

use crate::cli::control_socket;

pub async fn run_serve(cfg: QueueConfig) -> Result<()> {
    let download_dir = cfg.resolved_download_dir()?;
    tokio::fs::create_dir_all(&download_dir)
        .await
        .with_context(|| format!("create download dir: {}", download_dir.display()))?;
    let state_path = match &cfg.state_file {
        Some(path) => path.clone(),
        None => QueueStore::default_path()?,
    };
    let store = QueueStore::new(&state_path);

    let (queue, mut events) = QueueManager::start(
        cfg,
        download_dir.clone(),
        Some(store),
        Arc::new(ProcessLauncher::default()),
    )
    .await;

    let socket_path = default_control_socket_path()?;
    let listener = control_socket::spawn_control_listener(queue.clone(), &socket_path).await?;
    tracing::info!(
        socket = %socket_path.display(),
        state = %state_path.display(),
        "control socket listening"
    );
    eprintln!(
        "streamdl serving; downloads go to {} (Ctrl-C to stop)",
        download_dir.display()
    );

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("encode job event: {}", e),
            }
        }
    });

    wait_for_shutdown().await?;
    tracing::info!("shutdown requested");

    listener.abort();
    let result = queue.shutdown().await;
    printer.abort();
    let _ = std::fs::remove_file(&socket_path);
    result
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("wait for Ctrl-C")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await.context("wait for Ctrl-C")
}
