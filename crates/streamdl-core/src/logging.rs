//! Tracing setup shared by the server and the one-shot commands.
//!
//! Records are appended to `streamdl.log` in the state directory, next to
//! the queue file and the control socket. When that file cannot be opened
//! the caller switches to [`init_logging_stderr`].
//!
//! The filter comes from `STREAMDL_LOG`, then `RUST_LOG`, then
//! [`DEFAULT_FILTER`].

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "streamdl.log";

const FILTER_ENV: &str = "STREAMDL_LOG";

pub const DEFAULT_FILTER: &str = "info,streamdl_core=debug,streamdl_cli=debug";

/// `~/.local/state/streamdl`: logs, the state file and the control socket.
pub fn state_dir() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("streamdl")
        .context("resolve XDG base directories")?;
    Ok(dirs.get_state_home())
}

pub fn log_path() -> Result<PathBuf> {
    Ok(state_dir()?.join(LOG_FILE_NAME))
}

fn filter() -> EnvFilter {
    [FILTER_ENV, EnvFilter::DEFAULT_ENV]
        .into_iter()
        .find_map(|var| EnvFilter::try_from_env(var).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))
}

/// Send tracing output to the log file. Returns its path.
pub fn init_logging() -> Result<PathBuf> {
    let path = log_path()?;
    let file = open_append(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("install log subscriber: {e}"))?;

    tracing::info!(
        pid = std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
        "logging to {}",
        path.display()
    );
    Ok(path)
}

/// Terse stderr output for when the log file is unavailable.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
