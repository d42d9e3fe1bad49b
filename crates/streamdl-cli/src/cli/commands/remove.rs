//! `streamdl remove <id>` – remove a job that is not running; with
//! `--failed-only`, only if it failed.

use anyhow::{bail, Result};
use streamdl_core::control::ControlRequest;
use streamdl_core::job::JobId;

use crate::cli::control_socket;

pub async fn run_remove(id: JobId, failed_only: bool) -> Result<()> {
    let request = if failed_only {
        ControlRequest::RemoveFailed { id }
    } else {
        ControlRequest::Remove { id }
    };
    if !control_socket::request_ack(request).await? {
        if failed_only {
            bail!("job {id} has not failed");
        }
        bail!("job {id} is running or unknown");
    }
    println!("Removed job {id}");
    Ok(())
}
