//! Integration test: the queue driving real processes through `ProcessLauncher`.
//!
//! A shell script plays the download tool, so these run on Unix only.

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use streamdl_core::job::{JobId, JobStatus, StreamDescriptor};
use streamdl_core::queue::{JobEvent, QueueManager};
use streamdl_core::store::QueueStore;
use streamdl_core::supervisor::{FailureKind, ProcessLauncher};
use tempfile::tempdir;
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT: Duration = Duration::from_secs(10);

/// Receive events until one for `id` satisfies `pred`; returns every event seen for `id`.
async fn wait_for(
    events: &mut UnboundedReceiver<JobEvent>,
    id: JobId,
    pred: impl Fn(&JobEvent) -> bool,
) -> Vec<JobEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(WAIT, async {
        while let Some(e) = events.recv().await {
            if e.job_id != id {
                continue;
            }
            let done = pred(&e);
            seen.push(e);
            if done {
                return;
            }
        }
        panic!("event channel closed");
    })
    .await
    .expect("timed out waiting for job event");
    seen
}

fn stream(url: &str) -> StreamDescriptor {
    StreamDescriptor::new(url)
        .with_title("Integration Clip")
        .with_page_url("https://site.example/watch/1")
}

#[tokio::test]
async fn download_completes_and_reports_output_file() {
    let tmp = tempdir().unwrap();
    let script = common::fake_tool::install(tmp.path());
    let (queue, mut events) = QueueManager::start(
        common::fake_tool::config(&script, 2),
        tmp.path().to_path_buf(),
        None,
        Arc::new(ProcessLauncher::default()),
    )
    .await;

    let id = queue
        .enqueue(stream("https://cdn.example/ok/master.m3u8"), 0)
        .unwrap()
        .id;
    let seen = wait_for(&mut events, id, |e| e.status.is_terminal()).await;

    let last = seen.last().unwrap();
    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(last.progress, 100.0);
    assert!(seen.iter().any(|e| e.progress == 55.5));

    let job = queue.get_job(id).unwrap();
    let path = job.output_path.unwrap();
    assert_eq!(path.extension().unwrap(), "webm");
    assert!(path.starts_with(tmp.path()));
    assert_eq!(std::fs::read(&path).unwrap(), b"data");
    assert_eq!(job.logs.exit_code, Some(0));
    assert!(job.logs.stdout.iter().any(|l| l.contains("55.5%")));
    assert!(job.logs.command.unwrap().contains("Referer:https://site.example/watch/1"));
}

#[tokio::test]
async fn tool_error_is_classified() {
    let tmp = tempdir().unwrap();
    let script = common::fake_tool::install(tmp.path());
    let (queue, mut events) = QueueManager::start(
        common::fake_tool::config(&script, 1),
        tmp.path().to_path_buf(),
        None,
        Arc::new(ProcessLauncher::default()),
    )
    .await;

    let id = queue
        .enqueue(stream("https://cdn.example/fail/master.m3u8"), 0)
        .unwrap()
        .id;
    wait_for(&mut events, id, |e| e.status.is_terminal()).await;

    let job = queue.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure, Some(FailureKind::HttpForbidden));
    assert_eq!(job.logs.exit_code, Some(1));
    assert!(job.error.unwrap().contains("HTTP Error 403"));
}

#[tokio::test]
async fn missing_tool_fails_at_spawn() {
    let tmp = tempdir().unwrap();
    let mut cfg = common::fake_tool::config(tmp.path(), 1);
    cfg.tool.program = "streamdl-no-such-download-tool".to_string();
    cfg.tool.prefix_args.clear();
    let (queue, _events) = QueueManager::start(
        cfg,
        tmp.path().to_path_buf(),
        None,
        Arc::new(ProcessLauncher::default()),
    )
    .await;

    let id = queue
        .enqueue(stream("https://cdn.example/ok/master.m3u8"), 0)
        .unwrap()
        .id;
    let job = queue.get_job(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure, Some(FailureKind::ToolMissing));
    assert_eq!(queue.running_count(), 0);
}

#[tokio::test]
async fn pause_resume_and_cancel_a_running_process() {
    let tmp = tempdir().unwrap();
    let script = common::fake_tool::install(tmp.path());
    let (queue, mut events) = QueueManager::start(
        common::fake_tool::config(&script, 1),
        tmp.path().to_path_buf(),
        None,
        Arc::new(ProcessLauncher::default()),
    )
    .await;

    let slow = queue
        .enqueue(stream("https://cdn.example/slow/master.m3u8"), 0)
        .unwrap()
        .id;
    let next = queue
        .enqueue(stream("https://cdn.example/ok/master.m3u8"), 0)
        .unwrap()
        .id;
    wait_for(&mut events, slow, |e| e.progress == 5.0).await;

    assert!(queue.pause(slow));
    wait_for(&mut events, next, |e| e.status == JobStatus::Completed).await;
    assert_eq!(queue.get_job(slow).unwrap().status, JobStatus::Paused);
    assert_eq!(queue.get_job(slow).unwrap().progress, 5.0);

    assert!(queue.resume(slow));
    wait_for(&mut events, slow, |e| e.status == JobStatus::Running).await;

    assert!(queue.cancel(slow));
    let job = queue.get_job(slow).unwrap();
    assert!(job.was_cancelled());
    assert_eq!(queue.running_count(), 0);

    // The terminated process must not overwrite the cancellation.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(queue.get_job(slow).unwrap().was_cancelled());
}

#[tokio::test]
async fn running_jobs_are_requeued_after_restart() {
    let tmp = tempdir().unwrap();
    let script = common::fake_tool::install(tmp.path());
    let state = tmp.path().join("state/queue.json");

    let (queue, mut events) = QueueManager::start(
        common::fake_tool::config(&script, 1),
        tmp.path().to_path_buf(),
        Some(QueueStore::new(&state)),
        Arc::new(ProcessLauncher::default()),
    )
    .await;
    let slow = queue
        .enqueue(stream("https://cdn.example/slow/master.m3u8"), 0)
        .unwrap()
        .id;
    let waiting = queue
        .enqueue(stream("https://cdn.example/slow/other.m3u8"), 0)
        .unwrap()
        .id;
    wait_for(&mut events, slow, |e| e.progress == 5.0).await;
    queue.shutdown().await.unwrap();
    drop(queue);

    let stored = QueueStore::read(&state).unwrap().unwrap();
    assert_eq!(stored.download_queue, vec![waiting]);

    let (queue, mut events) = QueueManager::start(
        common::fake_tool::config(&script, 1),
        tmp.path().to_path_buf(),
        Some(QueueStore::new(&state)),
        Arc::new(ProcessLauncher::default()),
    )
    .await;
    assert_eq!(queue.get_job(slow).unwrap().status, JobStatus::Running);
    assert_eq!(queue.pending_ids(), vec![waiting]);
    wait_for(&mut events, slow, |e| e.progress == 5.0).await;
    queue.shutdown().await.unwrap();
}
