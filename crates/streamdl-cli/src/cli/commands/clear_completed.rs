//! `streamdl clear-completed` – drop finished jobs from the list.

use anyhow::{bail, Result};
use streamdl_core::control::{ControlRequest, ControlResponse};

use crate::cli::control_socket;

pub async fn run_clear_completed() -> Result<()> {
    match control_socket::request(&ControlRequest::ClearCompleted).await? {
        ControlResponse::Cleared { removed } => {
            println!("Removed {removed} completed job(s)");
            Ok(())
        }
        ControlResponse::Error { message } => bail!("{message}"),
        other => bail!("unexpected reply: {other:?}"),
    }
}
