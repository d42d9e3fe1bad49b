//! Control protocol between `streamdl` clients and a running `streamdl serve`.
//!
//! One JSON object per line in each direction. Requests are tagged by `op`;
//! every request gets exactly one response.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{Job, JobId, JobLogs, StreamDescriptor};
use crate::queue::QueueManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Enqueue {
        stream: StreamDescriptor,
        #[serde(default)]
        priority: i32,
    },
    Pause { id: JobId },
    Resume { id: JobId },
    Retry { id: JobId },
    Cancel { id: JobId },
    Remove { id: JobId },
    RemoveFailed { id: JobId },
    ClearCompleted,
    ListJobs,
    GetJob { id: JobId },
    GetLogs { id: JobId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    Enqueued { id: JobId, position: usize },
    /// Result of a control operation; `ok` is false when the job was in the
    /// wrong state or unknown.
    Ack { ok: bool },
    Cleared { removed: usize },
    Jobs { jobs: Vec<Job> },
    Job { job: Option<Job> },
    Logs { logs: Option<JobLogs> },
    Error { message: String },
}

impl ControlResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ControlResponse::Error {
            message: message.into(),
        }
    }
}

/// Default path for the control socket (same XDG state dir as the queue file).
pub fn default_control_socket_path() -> std::io::Result<PathBuf> {
    let dir = xdg::BaseDirectories::with_prefix("streamdl")?.get_state_home();
    Ok(dir.join("control.sock"))
}

impl QueueManager {
    /// Apply one control request.
    pub fn handle_request(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::Enqueue { stream, priority } => match self.enqueue(stream, priority) {
                Ok(e) => ControlResponse::Enqueued {
                    id: e.id,
                    position: e.position,
                },
                Err(e) => ControlResponse::error(e.to_string()),
            },
            ControlRequest::Pause { id } => ControlResponse::Ack { ok: self.pause(id) },
            ControlRequest::Resume { id } => ControlResponse::Ack {
                ok: self.resume(id),
            },
            ControlRequest::Retry { id } => ControlResponse::Ack { ok: self.retry(id) },
            ControlRequest::Cancel { id } => ControlResponse::Ack {
                ok: self.cancel(id),
            },
            ControlRequest::Remove { id } => ControlResponse::Ack {
                ok: self.remove(id),
            },
            ControlRequest::RemoveFailed { id } => ControlResponse::Ack {
                ok: self.remove_failed(id),
            },
            ControlRequest::ClearCompleted => ControlResponse::Cleared {
                removed: self.clear_completed(),
            },
            ControlRequest::ListJobs => ControlResponse::Jobs {
                jobs: self.list_jobs(),
            },
            ControlRequest::GetJob { id } => ControlResponse::Job {
                job: self.get_job(id),
            },
            ControlRequest::GetLogs { id } => ControlResponse::Logs {
                logs: self.get_logs(id),
            },
        }
    }
}
