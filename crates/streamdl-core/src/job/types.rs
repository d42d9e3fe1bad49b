//! Types for the job table: identifiers, status, logs, and the job record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use super::stream::StreamDescriptor;
use crate::progress::ProgressObservation;
use crate::supervisor::FailureKind;

/// Job identifier. Random, so ids are never reused across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(JobId)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// No further automatic transitions happen from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Displayed progress captured when a job is paused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub progress: f64,
    #[serde(default)]
    pub speed: Option<String>,
    #[serde(default)]
    pub eta: Option<String>,
}

/// Diagnostics retained for the most recent run of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLogs {
    #[serde(default)]
    pub stdout: Vec<String>,
    #[serde(default)]
    pub stderr: Vec<String>,
    /// Fully expanded command line of the last launch.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error_detail: Option<String>,
}

impl JobLogs {
    /// Per-stream cap; the oldest lines are dropped first.
    pub const MAX_LINES: usize = 1000;

    pub fn push_stdout(&mut self, line: impl Into<String>) {
        push_capped(&mut self.stdout, line.into());
    }

    pub fn push_stderr(&mut self, line: impl Into<String>) {
        push_capped(&mut self.stderr, line.into());
    }

    /// Start a fresh run: drop previous output and outcome.
    pub fn reset_for_run(&mut self, command: String) {
        self.stdout.clear();
        self.stderr.clear();
        self.command = Some(command);
        self.exit_code = None;
        self.error_detail = None;
    }
}

fn push_capped(buf: &mut Vec<String>, line: String) {
    if buf.len() >= JobLogs::MAX_LINES {
        let excess = buf.len() + 1 - JobLogs::MAX_LINES;
        buf.drain(..excess);
    }
    buf.push(line);
}

/// The mutable unit of work. Serialized as-is into the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub stream: StreamDescriptor,
    pub status: JobStatus,
    /// Percentage in [0, 100].
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub speed: Option<String>,
    #[serde(default)]
    pub eta: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    #[serde(default)]
    pub output_template: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub paused_snapshot: Option<ProgressSnapshot>,
    #[serde(default)]
    pub logs: JobLogs,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub failure: Option<FailureKind>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(stream: StreamDescriptor, priority: i32) -> Self {
        Self {
            id: JobId::new(),
            stream,
            status: JobStatus::Pending,
            progress: 0.0,
            speed: None,
            eta: None,
            size: None,
            priority,
            output_path: None,
            output_template: None,
            retry_count: 0,
            paused_snapshot: None,
            logs: JobLogs::default(),
            error: None,
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Apply one parsed observation. The percentage never moves backwards;
    /// speed, ETA and size are replaced whenever the tool reports them.
    pub fn apply_observation(&mut self, obs: &ProgressObservation) {
        let pct = obs.percentage.clamp(0.0, 100.0);
        if pct > self.progress {
            self.progress = pct;
        }
        if obs.speed.is_some() {
            self.speed = obs.speed.clone();
        }
        if obs.eta.is_some() {
            self.eta = obs.eta.clone();
        }
        if obs.size.is_some() {
            self.size = obs.size.clone();
        }
    }

    pub fn snapshot_progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            progress: self.progress,
            speed: self.speed.clone(),
            eta: self.eta.clone(),
        }
    }

    pub fn restore_snapshot(&mut self, snapshot: &ProgressSnapshot) {
        self.progress = snapshot.progress;
        self.speed = snapshot.speed.clone();
        self.eta = snapshot.eta.clone();
    }

    pub(crate) fn reset_progress(&mut self) {
        self.progress = 0.0;
        self.speed = None;
        self.eta = None;
        self.size = None;
        self.paused_snapshot = None;
    }

    /// Record a failure with its classification and a human-readable reason.
    pub(crate) fn fail(&mut self, kind: FailureKind, detail: Option<&str>) {
        let message = kind.describe(detail);
        self.status = JobStatus::Failed;
        self.failure = Some(kind);
        self.logs.error_detail = detail.map(str::to_string);
        self.error = Some(message);
        self.completed_at = Some(Utc::now());
    }

    pub fn was_cancelled(&self) -> bool {
        self.status == JobStatus::Failed && self.failure == Some(FailureKind::Cancelled)
    }

    /// Failed for a reason a plain retry may get past.
    pub fn is_retryable(&self) -> bool {
        self.status == JobStatus::Failed && self.failure.is_some_and(FailureKind::is_transient)
    }
}
