//! `streamdl cancel <id>` – cancel a job; it stays in the list as failed.

use anyhow::{bail, Result};
use streamdl_core::control::ControlRequest;
use streamdl_core::job::JobId;

use crate::cli::control_socket;

pub async fn run_cancel(id: JobId) -> Result<()> {
    if !control_socket::request_ack(ControlRequest::Cancel { id }).await? {
        bail!("job {id} cannot be cancelled (finished or unknown)");
    }
    println!("Cancelled job {id}");
    Ok(())
}
