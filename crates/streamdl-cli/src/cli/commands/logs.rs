//! `streamdl logs <id>` – command line and captured output of the last run.

use anyhow::{bail, Result};
use streamdl_core::control::{ControlRequest, ControlResponse};
use streamdl_core::job::{JobId, JobLogs};

use crate::cli::control_socket;

pub async fn run_logs(id: JobId) -> Result<()> {
    let logs = match control_socket::request(&ControlRequest::GetLogs { id }).await? {
        ControlResponse::Logs { logs: Some(logs) } => logs,
        ControlResponse::Logs { logs: None } => bail!("no job {id}"),
        ControlResponse::Error { message } => bail!("{message}"),
        other => bail!("unexpected reply: {other:?}"),
    };
    print!("{}", render(&logs));
    Ok(())
}

fn render(logs: &JobLogs) -> String {
    let mut out = String::new();
    if let Some(command) = &logs.command {
        out.push_str(&format!("$ {command}\n"));
    }
    for line in &logs.stdout {
        out.push_str(&format!("out: {line}\n"));
    }
    for line in &logs.stderr {
        out.push_str(&format!("err: {line}\n"));
    }
    if let Some(code) = logs.exit_code {
        out.push_str(&format!("exit code: {code}\n"));
    }
    if let Some(detail) = &logs.error_detail {
        out.push_str(&format!("error: {detail}\n"));
    }
    out
}
