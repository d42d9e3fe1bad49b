//! CLI for streamdl: `serve` hosts the queue; every other command is a client
//! of the running server (except `status`, which can read the saved state).

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use streamdl_core::config;
use streamdl_core::job::JobId;

use commands::{
    run_add, run_cancel, run_clear_completed, run_completions, run_logs, run_man, run_pause,
    run_remove, run_resume, run_retry, run_serve, run_status, AddArgs,
};

/// Top-level CLI for the streamdl download queue.
#[derive(Debug, Parser)]
#[command(name = "streamdl")]
#[command(about = "streamdl: queue captured media streams for download with yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the download queue and listen for control commands.
    Serve,

    /// Queue a captured stream for download.
    Add(AddArgs),

    /// Show all jobs (reads the saved state if no server is running).
    Status,

    /// Pause a running job; it restarts from the beginning when resumed.
    Pause {
        /// Job identifier.
        id: JobId,
    },

    /// Put a paused job back at the front of the queue.
    Resume {
        /// Job identifier.
        id: JobId,
    },

    /// Queue a failed job again from scratch.
    Retry {
        /// Job identifier.
        id: JobId,
    },

    /// Cancel a running, queued or paused job.
    Cancel {
        /// Job identifier.
        id: JobId,
    },

    /// Remove a job that is not running.
    Remove {
        /// Job identifier.
        id: JobId,
        /// Only remove the job if it failed.
        #[arg(long)]
        failed_only: bool,
    },

    /// Remove all completed jobs.
    ClearCompleted,

    /// Show the command line and captured output of a job's last run.
    Logs {
        /// Job identifier.
        id: JobId,
    },

    /// Print a shell completion script.
    Completions {
        /// Target shell.
        shell: Shell,
    },

    /// Print the man page (roff).
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            _ => {}
        }
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve => run_serve(cfg).await?,
            CliCommand::Add(args) => run_add(args).await?,
            CliCommand::Status => run_status(&cfg).await?,
            CliCommand::Pause { id } => run_pause(id).await?,
            CliCommand::Resume { id } => run_resume(id).await?,
            CliCommand::Retry { id } => run_retry(id).await?,
            CliCommand::Cancel { id } => run_cancel(id).await?,
            CliCommand::Remove { id, failed_only } => run_remove(id, failed_only).await?,
            CliCommand::ClearCompleted => run_clear_completed().await?,
            CliCommand::Logs { id } => run_logs(id).await?,
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
