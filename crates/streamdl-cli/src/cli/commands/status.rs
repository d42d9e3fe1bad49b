//! `streamdl status` – show all jobs, newest first.
//!
//! Asks the running server; without one, reads the saved state file instead.

use anyhow::{bail, Result};
use streamdl_core::config::QueueConfig;
use streamdl_core::control::{ControlRequest, ControlResponse};
use streamdl_core::job::{Job, JobStatus};
use streamdl_core::store::{reconcile, QueueStore};

use crate::cli::control_socket;

pub async fn run_status(cfg: &QueueConfig) -> Result<()> {
    let jobs = match control_socket::request(&ControlRequest::ListJobs).await {
        Ok(ControlResponse::Jobs { jobs }) => jobs,
        Ok(ControlResponse::Error { message }) => bail!("{message}"),
        Ok(other) => bail!("unexpected reply: {other:?}"),
        Err(e) => {
            tracing::debug!("server not reachable: {:#}", e);
            let Some(jobs) = saved_jobs(cfg)? else {
                println!("No jobs (server not running, no saved state).");
                return Ok(());
            };
            println!("(server not running; showing saved state)");
            jobs
        }
    };

    if jobs.is_empty() {
        println!("No jobs in queue.");
    } else {
        print!("{}", render_table(&jobs));
    }
    Ok(())
}

/// Jobs from the state file, newest first, with interrupted runs shown as pending.
fn saved_jobs(cfg: &QueueConfig) -> Result<Option<Vec<Job>>> {
    let path = match &cfg.state_file {
        Some(path) => path.clone(),
        None => QueueStore::default_path()?,
    };
    let Some(file) = QueueStore::read(&path)? else {
        return Ok(None);
    };
    let mut jobs = reconcile(file).jobs;
    jobs.reverse();
    Ok(Some(jobs))
}

fn render_table(jobs: &[Job]) -> String {
    let mut out = format!(
        "{:<36} {:<10} {:>6} {:<12} {:<8} {}\n",
        "ID", "STATUS", "PCT", "SPEED", "ETA", "NAME"
    );
    for j in jobs {
        let detail = match j.status {
            JobStatus::Failed => {
                let hint = if j.is_retryable() { " [retryable]" } else { "" };
                j.error.as_deref().map(|e| format!(" ({e}){hint}"))
            }
            JobStatus::Completed => j
                .output_path
                .as_ref()
                .map(|p| format!(" -> {}", p.display())),
            _ => None,
        }
        .unwrap_or_default();
        out.push_str(&format!(
            "{:<36} {:<10} {:>5.1}% {:<12} {:<8} {}{}\n",
            j.id,
            j.status.as_str(),
            j.progress,
            j.speed.as_deref().unwrap_or("-"),
            j.eta.as_deref().unwrap_or("-"),
            j.stream.display_name(),
            detail
        ));
    }
    out
}
