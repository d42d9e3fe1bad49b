//! Process supervision for the external download tool.
//!
//! The queue manager hands a `LaunchRequest` to a `Launcher`; the launcher
//! starts exactly one process and reports back over a channel of
//! `SupervisorEvent`s (output lines with parsed progress, periodic ticks, and
//! the final exit). Each admission carries a run number so events from a
//! process that was paused or cancelled can be told apart from the current run.

mod args;
mod classify;
pub mod output;
mod process;

pub use args::{build_invocation, ToolInvocation};
pub use classify::{classify_exit, classify_spawn_error, last_error_line, FailureKind};
pub use process::ProcessLauncher;

use std::io;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::job::JobId;
use crate::progress::ProgressObservation;

/// Everything needed to start one run of the tool for a job.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub job_id: JobId,
    pub run: u64,
    pub invocation: ToolInvocation,
    /// How often to emit a `Tick` while the process is alive.
    pub progress_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when killed by a signal or the exit status was unavailable.
    pub code: Option<i32>,
    /// We asked the process to stop (pause, cancel, shutdown).
    pub stopped: bool,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Events from a supervised run, in the order the process produced them.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Output {
        job_id: JobId,
        run: u64,
        stream: OutputStream,
        line: String,
        progress: Option<ProgressObservation>,
    },
    Tick {
        job_id: JobId,
        run: u64,
    },
    Exited {
        job_id: JobId,
        run: u64,
        report: ExitReport,
    },
}

impl SupervisorEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            SupervisorEvent::Output { job_id, .. }
            | SupervisorEvent::Tick { job_id, .. }
            | SupervisorEvent::Exited { job_id, .. } => *job_id,
        }
    }

    pub fn run(&self) -> u64 {
        match self {
            SupervisorEvent::Output { run, .. }
            | SupervisorEvent::Tick { run, .. }
            | SupervisorEvent::Exited { run, .. } => *run,
        }
    }
}

pub type SupervisorSender = mpsc::UnboundedSender<SupervisorEvent>;

/// Owner's handle on a running process.
///
/// Dropping the handle (or calling `stop`) asks the process to terminate and
/// ends its progress timer; the exit still arrives as `SupervisorEvent::Exited`
/// with `stopped` set.
#[derive(Debug)]
pub struct RunHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl RunHandle {
    pub fn new(stop: oneshot::Sender<()>) -> Self {
        Self { stop: Some(stop) }
    }

    pub fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }
}

/// Starts tool processes. Implemented by `ProcessLauncher`; tests substitute
/// their own to drive the queue without a real tool.
pub trait Launcher: Send + Sync {
    /// Spawn one process for `request`. Returns the spawn error synchronously;
    /// everything after that is reported through `events`.
    fn launch(&self, request: LaunchRequest, events: SupervisorSender) -> io::Result<RunHandle>;
}
