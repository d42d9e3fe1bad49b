//! Control socket: server (during `streamdl serve`) and client (every other command).
//! Protocol: one JSON `ControlRequest` per line, answered by one `ControlResponse` line.

use anyhow::{bail, Context, Result};
use std::path::Path;
use streamdl_core::control::{default_control_socket_path, ControlRequest, ControlResponse};
use streamdl_core::queue::QueueManager;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Binds `path` and spawns a task answering requests against `queue`.
///
/// A stale socket file is replaced; a socket with a live server behind it is
/// an error.
pub async fn spawn_control_listener(
    queue: QueueManager,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if UnixStream::connect(&path).await.is_ok() {
        bail!(
            "another streamdl server is already listening on {}",
            path.display()
        );
    }
    let _ = std::fs::remove_file(&path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket: {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(serve_connection(stream, queue.clone()));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_connection(stream: UnixStream, queue: QueueManager) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(line) {
            Ok(request) => {
                tracing::debug!(?request, "control request");
                queue.handle_request(request)
            }
            Err(e) => ControlResponse::error(format!("invalid request: {e}")),
        };
        let mut out = match serde_json::to_string(&response) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("encode control response: {}", e);
                break;
            }
        };
        out.push('\n');
        if write.write_all(out.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// Sends one request to the server at `socket_path` and waits for the reply.
pub async fn send_request(socket_path: &Path, request: &ControlRequest) -> Result<ControlResponse> {
    let stream = UnixStream::connect(socket_path).await.with_context(|| {
        format!(
            "connect to {} (is `streamdl serve` running?)",
            socket_path.display()
        )
    })?;
    let (read, mut write) = stream.into_split();

    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    write.write_all(line.as_bytes()).await?;

    let mut lines = BufReader::new(read).lines();
    let reply = lines
        .next_line()
        .await?
        .context("server closed the connection without replying")?;
    serde_json::from_str(&reply).context("parse server reply")
}

/// `send_request` against the default socket path.
pub async fn request(request: &ControlRequest) -> Result<ControlResponse> {
    let path = default_control_socket_path()?;
    send_request(&path, request).await
}

/// Sends a control operation and returns whether the server applied it.
pub async fn request_ack(req: ControlRequest) -> Result<bool> {
    match request(&req).await? {
        ControlResponse::Ack { ok } => Ok(ok),
        ControlResponse::Error { message } => bail!("{message}"),
        other => bail!("unexpected reply: {other:?}"),
    }
}
