use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{Job, JobId, JobStatus};

/// Outbound notification: emitted on every status change and every progress
/// update of a running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set on failures a plain retry may get past.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl JobEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            speed: job.speed.clone(),
            eta: job.eta.clone(),
            output_path: job.output_path.clone(),
            error: job.error.clone(),
            retryable: job.is_retryable(),
        }
    }
}

/// Result of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enqueued {
    pub id: JobId,
    /// 0-based index in the pending sequence at insertion time.
    pub position: usize,
}
