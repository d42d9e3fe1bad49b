//! Job table, pending order and active runs.
//!
//! Every method here runs under the queue lock and never awaits. Methods that
//! change what would be persisted call `touch`; progress-only changes call
//! `touch_progress` so they reach the file through the periodic write.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::events::{Enqueued, JobEvent};
use crate::config::QueueConfig;
use crate::job::{Job, JobId, JobLogs, JobStatus, StreamDescriptor, StreamError};
use crate::store::{QueueSnapshot, RestoredQueue};
use crate::supervisor::{
    build_invocation, classify_exit, classify_spawn_error, last_error_line, output, FailureKind,
    LaunchRequest, Launcher, OutputStream, RunHandle, SupervisorEvent, SupervisorSender,
};

/// What admission needs besides the state itself.
pub(crate) struct Deps {
    pub cfg: QueueConfig,
    pub download_dir: PathBuf,
    pub launcher: Arc<dyn Launcher>,
    pub supervisor_tx: SupervisorSender,
    pub events_tx: mpsc::UnboundedSender<JobEvent>,
}

impl Deps {
    fn emit(&self, job: &Job) {
        let _ = self.events_tx.send(JobEvent::from_job(job));
    }
}

struct ActiveRun {
    run: u64,
    template: String,
    handle: RunHandle,
}

#[derive(Default)]
pub(crate) struct QueueState {
    jobs: HashMap<JobId, Job>,
    pending: VecDeque<JobId>,
    /// Exactly the jobs whose status is `Running`.
    active: HashMap<JobId, ActiveRun>,
    /// Runs told to stop whose exit has not arrived yet, with the template
    /// they were writing to.
    stopping: HashMap<u64, String>,
    next_run: u64,
    revision: u64,
    dirty: bool,
}

impl QueueState {
    pub(crate) fn restore(restored: RestoredQueue) -> Self {
        Self {
            jobs: restored.jobs.into_iter().map(|j| (j.id, j)).collect(),
            pending: restored.pending.into(),
            ..Self::default()
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.dirty = true;
    }

    fn touch_progress(&mut self) {
        self.revision += 1;
    }

    /// True once after any persisted-field change.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        QueueSnapshot {
            revision: self.revision,
            jobs,
            pending: self.pending.iter().copied().collect(),
        }
    }

    pub(crate) fn running_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn pending_ids(&self) -> Vec<JobId> {
        self.pending.iter().copied().collect()
    }

    pub(crate) fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub(crate) fn logs(&self, id: JobId) -> Option<JobLogs> {
        self.jobs.get(&id).map(|j| j.logs.clone())
    }

    /// All jobs, newest first.
    pub(crate) fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Priority jobs go after the leading run of priority jobs, so they stay
    /// FIFO among themselves but overtake normal ones.
    fn priority_slot(&self) -> usize {
        self.pending
            .iter()
            .take_while(|id| self.jobs.get(*id).is_some_and(|j| j.priority > 0))
            .count()
    }

    pub(crate) fn enqueue(
        &mut self,
        deps: &Deps,
        stream: StreamDescriptor,
        priority: i32,
    ) -> Result<Enqueued, StreamError> {
        stream.validate()?;
        let job = Job::new(stream, priority);
        let id = job.id;
        let position = if priority > 0 {
            self.priority_slot()
        } else {
            self.pending.len()
        };
        self.pending.insert(position, id);
        tracing::info!(job_id = %id, url = %job.stream.url, priority, position, "job enqueued");
        deps.emit(&job);
        self.jobs.insert(id, job);
        self.touch();
        self.pump(deps);
        Ok(Enqueued { id, position })
    }

    /// Admit pending jobs while there is a free slot.
    pub(crate) fn pump(&mut self, deps: &Deps) {
        let limit = deps.cfg.max_concurrent();
        while self.active.len() < limit {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let admissible = self
                .jobs
                .get(&id)
                .is_some_and(|j| j.status == JobStatus::Pending);
            if admissible {
                self.admit(deps, id);
            } else {
                tracing::debug!(job_id = %id, "dropping non-pending id from queue");
            }
            self.touch();
        }
    }

    fn admit(&mut self, deps: &Deps, id: JobId) {
        let Some(job) = self.jobs.get_mut(&id) else {
            return;
        };
        let now = Utc::now();
        let template = output::output_template(&deps.download_dir, &job.stream, now);
        let invocation = build_invocation(
            job,
            &template,
            &deps.cfg.tool,
            &deps.cfg.fallback_user_agent,
        );

        job.output_path = Some(output::with_extension(&template, output::DEFAULT_EXTENSION));
        job.output_template = Some(template.clone());
        job.logs.reset_for_run(invocation.command_line());
        job.status = JobStatus::Running;
        job.started_at = Some(now);
        job.completed_at = None;
        job.error = None;
        job.failure = None;
        if let Some(snapshot) = job.paused_snapshot.take() {
            job.restore_snapshot(&snapshot);
        }

        self.next_run += 1;
        let run = self.next_run;
        let request = LaunchRequest {
            job_id: id,
            run,
            invocation,
            progress_interval: deps.cfg.progress_interval(),
        };
        match deps.launcher.launch(request, deps.supervisor_tx.clone()) {
            Ok(handle) => {
                self.active.insert(
                    id,
                    ActiveRun {
                        run,
                        template,
                        handle,
                    },
                );
                tracing::info!(job_id = %id, run, "job started");
            }
            Err(e) => {
                let kind = classify_spawn_error(&e);
                let detail = e.to_string();
                job.logs.push_stderr(detail.clone());
                job.fail(kind, Some(&detail));
                tracing::warn!(job_id = %id, "failed to start download tool: {}", e);
            }
        }
        deps.emit(job);
    }

    pub(crate) fn pause(&mut self, deps: &Deps, id: JobId) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        match job.status {
            JobStatus::Paused => true,
            JobStatus::Running => {
                job.paused_snapshot = Some(job.snapshot_progress());
                job.status = JobStatus::Paused;
                deps.emit(job);
                tracing::info!(job_id = %id, progress = job.progress, "job paused");
                self.stop_run(id);
                self.touch();
                self.pump(deps);
                true
            }
            _ => false,
        }
    }

    /// Resumed jobs go to the head of the queue; the tool restarts from the beginning.
    pub(crate) fn resume(&mut self, deps: &Deps, id: JobId) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        if job.status != JobStatus::Paused {
            return false;
        }
        if let Some(snapshot) = job.paused_snapshot.clone() {
            job.restore_snapshot(&snapshot);
        }
        job.status = JobStatus::Pending;
        deps.emit(job);
        self.pending.push_front(id);
        tracing::info!(job_id = %id, "job resumed");
        self.touch();
        self.pump(deps);
        true
    }

    pub(crate) fn retry(&mut self, deps: &Deps, id: JobId) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        if job.status != JobStatus::Failed {
            return false;
        }
        job.reset_progress();
        job.retry_count += 1;
        job.status = JobStatus::Pending;
        job.error = None;
        job.failure = None;
        job.completed_at = None;
        deps.emit(job);
        tracing::info!(job_id = %id, retry = job.retry_count, "job queued for retry");
        self.pending.push_back(id);
        self.touch();
        self.pump(deps);
        true
    }

    pub(crate) fn cancel(&mut self, deps: &Deps, id: JobId) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        match job.status {
            JobStatus::Running | JobStatus::Pending | JobStatus::Paused => {
                let was = job.status;
                job.fail(FailureKind::Cancelled, None);
                if was == JobStatus::Running {
                    // The partial file goes away once the process exits.
                    job.output_path = None;
                }
                deps.emit(job);
                tracing::info!(job_id = %id, from = %was, "job cancelled");
                match was {
                    JobStatus::Running => self.stop_run(id),
                    JobStatus::Pending => self.pending.retain(|p| *p != id),
                    _ => {}
                }
                self.touch();
                self.pump(deps);
                true
            }
            JobStatus::Failed if job.was_cancelled() => true,
            _ => false,
        }
    }

    /// Delete any job that is not running.
    pub(crate) fn remove(&mut self, id: JobId) -> bool {
        match self.jobs.get(&id) {
            Some(job) if job.status != JobStatus::Running => {}
            _ => return false,
        }
        self.jobs.remove(&id);
        self.pending.retain(|p| *p != id);
        tracing::info!(job_id = %id, "job removed");
        self.touch();
        true
    }

    /// Delete a job only if it failed (or was cancelled).
    pub(crate) fn remove_failed(&mut self, id: JobId) -> bool {
        match self.jobs.get(&id) {
            Some(job) if matches!(job.status, JobStatus::Failed | JobStatus::Cancelled) => {
                self.remove(id)
            }
            _ => false,
        }
    }

    pub(crate) fn clear_completed(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, j| j.status != JobStatus::Completed);
        let removed = before - self.jobs.len();
        if removed > 0 {
            tracing::info!(removed, "cleared completed jobs");
            self.touch();
        }
        removed
    }

    /// Output template of `id` if `run` is its current run.
    pub(crate) fn current_template(&self, id: JobId, run: u64) -> Option<String> {
        let active = self.active.get(&id)?;
        if active.run != run {
            return None;
        }
        self.jobs.get(&id)?.output_template.clone()
    }

    fn stop_run(&mut self, id: JobId) {
        if let Some(active) = self.active.remove(&id) {
            active.handle.stop();
            self.stopping.insert(active.run, active.template);
        }
    }

    /// Settle the exit of a run we stopped. Returns the template whose files
    /// should be deleted: the process was killed before finishing and no
    /// current run writes to the same name.
    fn settle_stopped_exit(&mut self, event: &SupervisorEvent) -> Option<String> {
        let SupervisorEvent::Exited { run, report, .. } = event else {
            return None;
        };
        let template = self.stopping.remove(run)?;
        if !report.stopped || report.success() {
            return None;
        }
        if self.active.values().any(|a| a.template == template) {
            return None;
        }
        Some(template)
    }

    /// Apply one supervisor event. Events from a run that is no longer
    /// current (paused, cancelled, restarted) are ignored, except that the
    /// exit of a stopped run hands back its output template for cleanup.
    ///
    /// `located` is the output file found on disk for a successful exit.
    pub(crate) fn apply_supervisor_event(
        &mut self,
        deps: &Deps,
        event: SupervisorEvent,
        located: Option<PathBuf>,
    ) -> Option<String> {
        let id = event.job_id();
        if self.active.get(&id).map(|a| a.run) != Some(event.run()) {
            let leftover = self.settle_stopped_exit(&event);
            tracing::trace!(job_id = %id, run = event.run(), "ignoring event from stale run");
            return leftover;
        }
        let Some(job) = self.jobs.get_mut(&id) else {
            return None;
        };
        if job.status != JobStatus::Running {
            return None;
        }

        match event {
            SupervisorEvent::Output {
                stream,
                line,
                progress,
                ..
            } => {
                match stream {
                    OutputStream::Stdout => job.logs.push_stdout(line),
                    OutputStream::Stderr => job.logs.push_stderr(line),
                }
                if let Some(obs) = progress {
                    job.apply_observation(&obs);
                    deps.emit(job);
                }
                self.touch_progress();
            }
            SupervisorEvent::Tick { .. } => deps.emit(job),
            SupervisorEvent::Exited { report, run, .. } => {
                self.active.remove(&id);
                job.logs.exit_code = report.code;
                if report.success() {
                    job.status = JobStatus::Completed;
                    job.progress = 100.0;
                    job.eta = None;
                    job.completed_at = Some(Utc::now());
                    if located.is_some() {
                        job.output_path = located;
                    } else if let Some(template) = job.output_template.as_deref() {
                        job.output_path = Some(output::locate_output(template));
                    }
                    tracing::info!(job_id = %id, run, path = ?job.output_path, "job completed");
                } else {
                    let kind = classify_exit(report.code, &job.logs.stderr);
                    let detail = last_error_line(&job.logs.stderr).map(str::to_string);
                    job.fail(kind, detail.as_deref());
                    tracing::warn!(job_id = %id, run, code = ?report.code, "job failed: {}", kind);
                }
                deps.emit(job);
                self.touch();
                self.pump(deps);
            }
        }
        None
    }

    /// Stop every running process without changing job status, so a later
    /// load puts them back in the queue. Returns how many were stopped.
    pub(crate) fn stop_all(&mut self) -> usize {
        let ids: Vec<JobId> = self.active.keys().copied().collect();
        for id in &ids {
            self.stop_run(*id);
        }
        ids.len()
    }
}
