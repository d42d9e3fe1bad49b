//! `tokio::process` implementation of `Launcher`.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use super::{
    ExitReport, LaunchRequest, Launcher, OutputStream, RunHandle, SupervisorEvent,
    SupervisorSender,
};
use crate::progress::ProgressParser;

/// Time between the polite termination signal and a hard kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Upper bound on reading leftover output after the process has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Spawns the download tool and streams its output through the progress parser.
#[derive(Clone, Default)]
pub struct ProcessLauncher {
    parser: Arc<ProgressParser>,
}

impl ProcessLauncher {
    pub fn new(parser: ProgressParser) -> Self {
        Self {
            parser: Arc::new(parser),
        }
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, request: LaunchRequest, events: SupervisorSender) -> io::Result<RunHandle> {
        let mut child = Command::new(&request.invocation.program)
            .args(&request.invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "stderr not captured"))?;

        tracing::debug!(
            job_id = %request.job_id,
            run = request.run,
            pid = child.id(),
            "spawned download tool"
        );

        let (stop_tx, stop_rx) = oneshot::channel();
        let parser = Arc::clone(&self.parser);
        tokio::spawn(supervise(
            child, stdout, stderr, stop_rx, request, events, parser,
        ));
        Ok(RunHandle::new(stop_tx))
    }
}

async fn supervise<O, E>(
    mut child: Child,
    stdout: O,
    stderr: E,
    mut stop_rx: oneshot::Receiver<()>,
    request: LaunchRequest,
    events: SupervisorSender,
    parser: Arc<ProgressParser>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let job_id = request.job_id;
    let run = request.run;

    let emit = |stream: OutputStream, bytes: Vec<u8>| {
        let raw = String::from_utf8_lossy(&bytes);
        let raw = raw.trim_end();
        // Progress redraws may be separated by carriage returns; keep the last one.
        let Some(line) = raw.rsplit('\r').map(str::trim_end).find(|s| !s.is_empty()) else {
            return;
        };
        let progress = parser.parse(raw);
        let _ = events.send(SupervisorEvent::Output {
            job_id,
            run,
            stream,
            line: line.to_string(),
            progress,
        });
    };

    let mut out = BufReader::new(stdout).split(b'\n');
    let mut err = BufReader::new(stderr).split(b'\n');
    let (mut out_done, mut err_done) = (false, false);

    let mut ticker = tokio::time::interval(request.progress_interval.max(Duration::from_millis(50)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let grace = tokio::time::sleep(KILL_GRACE);
    tokio::pin!(grace);
    let mut stopping = false;
    let mut killed = false;

    let status = loop {
        tokio::select! {
            seg = out.next_segment(), if !out_done => match seg {
                Ok(Some(bytes)) => emit(OutputStream::Stdout, bytes),
                _ => out_done = true,
            },
            seg = err.next_segment(), if !err_done => match seg {
                Ok(Some(bytes)) => emit(OutputStream::Stderr, bytes),
                _ => err_done = true,
            },
            _ = ticker.tick(), if !stopping => {
                let _ = events.send(SupervisorEvent::Tick { job_id, run });
            }
            _ = &mut stop_rx, if !stopping => {
                stopping = true;
                request_terminate(&mut child);
                grace.as_mut().reset(Instant::now() + KILL_GRACE);
                tracing::debug!(%job_id, run, "termination requested");
            }
            _ = &mut grace, if stopping && !killed => {
                killed = true;
                tracing::warn!(%job_id, run, "tool ignored termination; killing");
                let _ = child.start_kill();
            }
            status = child.wait() => break status,
        }
    };

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        if !out_done {
            drain(&mut out, OutputStream::Stdout, &emit).await;
        }
        if !err_done {
            drain(&mut err, OutputStream::Stderr, &emit).await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::debug!(%job_id, run, "output still open after exit; giving up on drain");
    }

    let code = match status {
        Ok(s) => s.code(),
        Err(e) => {
            tracing::warn!(%job_id, run, "wait on download tool failed: {}", e);
            None
        }
    };
    tracing::debug!(%job_id, run, ?code, stopped = stopping, "download tool exited");
    let _ = events.send(SupervisorEvent::Exited {
        job_id,
        run,
        report: ExitReport {
            code,
            stopped: stopping,
        },
    });
}

async fn drain<R, F>(split: &mut Split<BufReader<R>>, stream: OutputStream, emit: &F)
where
    R: AsyncRead + Unpin,
    F: Fn(OutputStream, Vec<u8>),
{
    while let Ok(Some(bytes)) = split.next_segment().await {
        emit(stream, bytes);
    }
}

/// Ask the process to exit: SIGTERM on Unix so the tool can clean up.
#[cfg(unix)]
fn request_terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: `pid` is our own child and has not been reaped yet (`id()` is
        // `None` after the exit status was collected).
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    let _ = child.start_kill();
}
