//! On-disk schema and startup reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::QueueSnapshot;
use crate::job::{Job, JobId, JobStatus};

/// Schema version written to the state file.
pub const STATE_VERSION: &str = "1";

/// `{version, timestamp, jobs: [[id, job], ...], downloadQueue: [id, ...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueue {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub jobs: Vec<(JobId, Job)>,
    #[serde(default)]
    pub download_queue: Vec<JobId>,
}

impl PersistedQueue {
    pub fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            timestamp: Utc::now(),
            jobs: snapshot.jobs.iter().map(|j| (j.id, j.clone())).collect(),
            download_queue: snapshot.pending.clone(),
        }
    }
}

/// Job table and pending order rebuilt from a state file.
#[derive(Debug, Clone, Default)]
pub struct RestoredQueue {
    /// Jobs oldest first.
    pub jobs: Vec<Job>,
    pub pending: Vec<JobId>,
    /// Jobs that were `Running` when the file was written and are `Pending` again.
    pub recovered: usize,
}

/// Rebuild a consistent queue from a stored file.
///
/// - `Running` jobs are reset to `Pending` (their process is gone) and placed
///   ahead of the stored order, earliest started first.
/// - The stored order keeps only ids whose job is `Pending`, without duplicates.
/// - `Pending` jobs missing from the order are appended, oldest first.
pub fn reconcile(file: PersistedQueue) -> RestoredQueue {
    let mut jobs: Vec<Job> = Vec::with_capacity(file.jobs.len());
    let mut seen: HashSet<JobId> = HashSet::new();
    let mut recovered: Vec<(Option<DateTime<Utc>>, JobId)> = Vec::new();

    for (id, mut job) in file.jobs {
        if job.id != id {
            tracing::warn!(key = %id, job_id = %job.id, "state file key and job id differ; using key");
            job.id = id;
        }
        if !seen.insert(id) {
            tracing::warn!(job_id = %id, "duplicate job in state file; keeping the first");
            continue;
        }
        if job.status == JobStatus::Running {
            job.status = JobStatus::Pending;
            recovered.push((job.started_at, id));
        }
        jobs.push(job);
    }
    jobs.sort_by_key(|j| j.created_at);
    recovered.sort();

    let status: HashMap<JobId, JobStatus> = jobs.iter().map(|j| (j.id, j.status)).collect();
    let mut queued: HashSet<JobId> = HashSet::new();
    let mut pending: Vec<JobId> = Vec::new();

    let stored = file.download_queue.into_iter();
    for id in recovered.iter().map(|(_, id)| *id).chain(stored) {
        if status.get(&id) == Some(&JobStatus::Pending) && queued.insert(id) {
            pending.push(id);
        }
    }
    for job in &jobs {
        if job.status == JobStatus::Pending && queued.insert(job.id) {
            pending.push(job.id);
        }
    }

    RestoredQueue {
        jobs,
        pending,
        recovered: recovered.len(),
    }
}
