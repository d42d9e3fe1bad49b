//! `streamdl pause <id>` – stop a running job and keep its progress for display.

use anyhow::{bail, Result};
use streamdl_core::control::ControlRequest;
use streamdl_core::job::JobId;

use crate::cli::control_socket;

pub async fn run_pause(id: JobId) -> Result<()> {
    if !control_socket::request_ack(ControlRequest::Pause { id }).await? {
        bail!("job {id} is not running");
    }
    println!("Paused job {id}");
    Ok(())
}
