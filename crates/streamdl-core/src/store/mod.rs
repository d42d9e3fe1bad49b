//! Persist the job table and pending order to a JSON file.
//!
//! Writes go to a sibling temp file which is then renamed over the real
//! file, so a reader never sees a partial write. Loading never fails: a
//! missing file means an empty queue, a corrupt file is moved aside.

mod file;

pub use file::{reconcile, PersistedQueue, RestoredQueue, STATE_VERSION};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::job::{Job, JobId};

/// Full in-memory state at one revision, taken under the queue lock.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    /// Monotonic change counter of the queue; newer snapshots have larger values.
    pub revision: u64,
    /// All jobs, oldest first.
    pub jobs: Vec<Job>,
    /// Pending ids in admission order.
    pub pending: Vec<JobId>,
}

/// Path for the temp file: appends `.tmp` to the state file path.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(".tmp");
    PathBuf::from(o)
}

/// Where a state file that failed to parse is moved.
pub fn corrupt_path(path: &Path) -> PathBuf {
    let mut o = path.as_os_str().to_owned();
    o.push(".corrupt");
    PathBuf::from(o)
}

/// JSON file store for the queue.
#[derive(Debug)]
pub struct QueueStore {
    path: PathBuf,
    /// Revision of the last successful write; also serializes writers.
    last_written: tokio::sync::Mutex<Option<u64>>,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_written: tokio::sync::Mutex::new(None),
        }
    }

    /// Default state file: `~/.local/state/streamdl/queue.json`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(crate::logging::state_dir()?.join("queue.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot` atomically. Returns `Ok(false)` without touching the
    /// file when a newer revision has already been written.
    pub async fn save(&self, snapshot: &QueueSnapshot) -> Result<bool> {
        let mut last = self.last_written.lock().await;
        if let Some(prev) = *last {
            if snapshot.revision < prev {
                tracing::debug!(
                    revision = snapshot.revision,
                    written = prev,
                    "skipping stale queue snapshot"
                );
                return Ok(false);
            }
        }

        let file = PersistedQueue::from_snapshot(snapshot);
        let json = serde_json::to_vec_pretty(&file).context("serialize queue state")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }

        let tmp = temp_path(&self.path);
        if let Err(e) = write_synced(&tmp, &json).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;

        *last = Some(snapshot.revision);
        tracing::trace!(
            revision = snapshot.revision,
            jobs = snapshot.jobs.len(),
            "queue state written"
        );
        Ok(true)
    }

    /// Load and reconcile the state file. Never fails: problems are logged and
    /// an empty queue is returned.
    pub async fn load(&self) -> RestoredQueue {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no queue state file; starting empty");
                return RestoredQueue::default();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "read queue state: {}; starting empty", e);
                return RestoredQueue::default();
            }
        };

        match serde_json::from_slice::<PersistedQueue>(&bytes) {
            Ok(file) => {
                let restored = reconcile(file);
                tracing::info!(
                    path = %self.path.display(),
                    jobs = restored.jobs.len(),
                    pending = restored.pending.len(),
                    recovered = restored.recovered,
                    "loaded queue state"
                );
                restored
            }
            Err(e) => {
                let aside = corrupt_path(&self.path);
                tracing::warn!(
                    path = %self.path.display(),
                    "queue state file is corrupt ({}); moving it to {} and starting empty",
                    e,
                    aside.display()
                );
                if let Err(e) = tokio::fs::rename(&self.path, &aside).await {
                    tracing::warn!("could not move corrupt state file aside: {}", e);
                }
                RestoredQueue::default()
            }
        }
    }

    /// Read the state file as stored, without reconciling or side effects.
    /// Returns `None` when the file does not exist.
    pub fn read(path: &Path) -> Result<Option<PersistedQueue>> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read queue state: {}", path.display()))
            }
        };
        let file = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse queue state: {}", path.display()))?;
        Ok(Some(file))
    }
}

async fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut f = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    f.write_all(data)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    f.sync_all()
        .await
        .with_context(|| format!("sync {}", path.display()))?;
    Ok(())
}
