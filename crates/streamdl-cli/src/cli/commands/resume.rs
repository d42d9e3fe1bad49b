//! `streamdl resume <id>` – resume a paused job.

use anyhow::{bail, Result};
use streamdl_core::control::ControlRequest;
use streamdl_core::job::JobId;

use crate::cli::control_socket;

pub async fn run_resume(id: JobId) -> Result<()> {
    if !control_socket::request_ack(ControlRequest::Resume { id }).await? {
        bail!("job {id} is not paused");
    }
    println!("Resumed job {id}");
    Ok(())
}
