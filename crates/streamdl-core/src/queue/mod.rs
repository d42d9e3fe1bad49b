//! The download queue: admission under a concurrency limit, user control
//! operations, and write-behind persistence.
//!
//! `QueueManager` is a cheap handle; clones share one queue. All state sits
//! behind a single mutex. Background tasks apply supervisor events, write the
//! newest snapshot whenever the queue changes, and write on a fixed interval
//! so progress reaches the file too. None of them keep the queue alive.

mod events;
mod state;

pub use events::{Enqueued, JobEvent};

use anyhow::Result;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::QueueConfig;
use crate::job::{Job, JobId, JobLogs, StreamDescriptor, StreamError};
use crate::store::{QueueSnapshot, QueueStore, RestoredQueue};
use crate::supervisor::{output, Launcher, SupervisorEvent};
use state::{Deps, QueueState};

type SnapshotSlot = Option<Arc<QueueSnapshot>>;

struct Shared {
    deps: Deps,
    state: Mutex<QueueState>,
    store: Option<Arc<QueueStore>>,
    persist_tx: watch::Sender<SnapshotSlot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` under the lock; hand a snapshot to the writer if it changed
    /// anything that is persisted.
    fn mutate<R>(&self, f: impl FnOnce(&mut QueueState, &Deps) -> R) -> R {
        let mut state = self.lock();
        let out = f(&mut *state, &self.deps);
        if state.take_dirty() && self.store.is_some() {
            self.persist_tx.send_replace(Some(Arc::new(state.snapshot())));
        }
        out
    }

    async fn persist_now(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let snapshot = self.lock().snapshot();
        store.save(&snapshot).await?;
        Ok(())
    }

    fn on_supervisor_event(&self, event: SupervisorEvent) {
        let located = match &event {
            SupervisorEvent::Exited {
                job_id,
                run,
                report,
            } if report.success() => {
                let template = self.lock().current_template(*job_id, *run);
                template.map(|t| output::locate_output(&t))
            }
            _ => None,
        };
        let leftover =
            self.mutate(|state, deps| state.apply_supervisor_event(deps, event, located));
        if let Some(template) = leftover {
            let removed = output::remove_outputs(&template);
            if !removed.is_empty() {
                tracing::debug!(?removed, "removed output of stopped run");
            }
        }
    }
}

/// Handle on the download queue.
#[derive(Clone)]
pub struct QueueManager {
    shared: Arc<Shared>,
}

impl QueueManager {
    /// Load `store` (if any), start the background tasks and admit whatever
    /// the restored queue allows. Returns the receiver for job events.
    pub async fn start(
        cfg: QueueConfig,
        download_dir: PathBuf,
        store: Option<QueueStore>,
        launcher: Arc<dyn Launcher>,
    ) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let restored = match &store {
            Some(store) => store.load().await,
            None => RestoredQueue::default(),
        };
        let (supervisor_tx, supervisor_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (persist_tx, persist_rx) = watch::channel(None);
        let store = store.map(Arc::new);
        let persist_interval = cfg.persist_interval();

        tracing::info!(
            max_concurrent = cfg.max_concurrent(),
            download_dir = %download_dir.display(),
            jobs = restored.jobs.len(),
            "queue starting"
        );

        let shared = Arc::new(Shared {
            deps: Deps {
                cfg,
                download_dir,
                launcher,
                supervisor_tx,
                events_tx,
            },
            state: Mutex::new(QueueState::restore(restored)),
            store: store.clone(),
            persist_tx,
        });

        tokio::spawn(drive(Arc::downgrade(&shared), supervisor_rx));
        if let Some(store) = store {
            tokio::spawn(write_behind(store, persist_rx));
            tokio::spawn(persist_periodically(
                Arc::downgrade(&shared),
                persist_interval,
            ));
        }

        shared.mutate(|state, deps| state.pump(deps));
        (Self { shared }, events_rx)
    }

    /// Validate and append a new job. Jobs with `priority > 0` go ahead of
    /// normal ones.
    pub fn enqueue(
        &self,
        stream: StreamDescriptor,
        priority: i32,
    ) -> Result<Enqueued, StreamError> {
        self.shared
            .mutate(|state, deps| state.enqueue(deps, stream, priority))
    }

    /// Stop a running job and keep its progress for display. `true` if the
    /// job is now paused.
    pub fn pause(&self, id: JobId) -> bool {
        self.shared.mutate(|state, deps| state.pause(deps, id))
    }

    pub fn resume(&self, id: JobId) -> bool {
        self.shared.mutate(|state, deps| state.resume(deps, id))
    }

    /// Re-queue a failed job from scratch.
    pub fn retry(&self, id: JobId) -> bool {
        self.shared.mutate(|state, deps| state.retry(deps, id))
    }

    pub fn cancel(&self, id: JobId) -> bool {
        self.shared.mutate(|state, deps| state.cancel(deps, id))
    }

    pub fn remove(&self, id: JobId) -> bool {
        self.shared.mutate(|state, _| state.remove(id))
    }

    pub fn remove_failed(&self, id: JobId) -> bool {
        self.shared.mutate(|state, _| state.remove_failed(id))
    }

    /// Number of completed jobs removed.
    pub fn clear_completed(&self) -> usize {
        self.shared.mutate(|state, _| state.clear_completed())
    }

    /// All jobs, newest first.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.shared.lock().list()
    }

    pub fn get_job(&self, id: JobId) -> Option<Job> {
        self.shared.lock().get(id).cloned()
    }

    pub fn get_logs(&self, id: JobId) -> Option<JobLogs> {
        self.shared.lock().logs(id)
    }

    pub fn running_count(&self) -> usize {
        self.shared.lock().running_count()
    }

    /// Pending ids in admission order.
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.shared.lock().pending_ids()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.deps.cfg
    }

    /// Write the current state now.
    pub async fn flush(&self) -> Result<()> {
        self.shared.persist_now().await
    }

    /// Stop all running processes and write the state. Running jobs keep
    /// their status on disk and are re-queued on the next start.
    pub async fn shutdown(&self) -> Result<()> {
        let stopped = self.shared.lock().stop_all();
        if stopped > 0 {
            tracing::info!(stopped, "stopped running downloads for shutdown");
        }
        self.flush().await
    }
}

async fn drive(weak: Weak<Shared>, mut rx: mpsc::UnboundedReceiver<SupervisorEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        shared.on_supervisor_event(event);
    }
}

/// Writes the newest published snapshot; intermediate ones are skipped.
async fn write_behind(store: Arc<QueueStore>, mut rx: watch::Receiver<SnapshotSlot>) {
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if let Some(snapshot) = snapshot {
            if let Err(e) = store.save(&snapshot).await {
                tracing::warn!("write queue state: {:#}", e);
            }
        }
    }
}

async fn persist_periodically(weak: Weak<Shared>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(shared) = weak.upgrade() else {
            break;
        };
        if let Err(e) = shared.persist_now().await {
            tracing::warn!("periodic queue state write: {:#}", e);
        }
    }
}
