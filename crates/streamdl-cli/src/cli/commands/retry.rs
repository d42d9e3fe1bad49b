//! `streamdl retry <id>` – queue a failed job again.

use anyhow::{bail, Result};
use streamdl_core::control::ControlRequest;
use streamdl_core::job::JobId;

use crate::cli::control_socket;

pub async fn run_retry(id: JobId) -> Result<()> {
    if !control_socket::request_ack(ControlRequest::Retry { id }).await? {
        bail!("job {id} has not failed");
    }
    println!("Retrying job {id}");
    Ok(())
}
