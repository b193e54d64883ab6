//! CLI for cloudlift.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloudlift_core::config::LiftConfig;
use cloudlift_core::destinations::{DestinationSet, Provider};
use cloudlift_core::job_log::JobLogs;
use cloudlift_core::job_store::{JobId, JobStore};
use cloudlift_core::scheduler::Scheduler;
use cloudlift_core::transfer::{CurlDownloader, S3Uploader, TransferExecutor, TransferSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use commands::{
    run_add, run_cancel, run_clear, run_destinations, run_logs, run_process, run_status,
};

/// Top-level CLI for cloudlift.
#[derive(Debug, Parser)]
#[command(name = "cloudlift")]
#[command(about = "cloudlift: download a URL once, upload it to several S3-compatible buckets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a transfer job.
    Add {
        /// Direct HTTP/HTTPS URL to fetch.
        url: String,

        /// Store the file under this name instead of the one derived from the URL.
        #[arg(long, value_name = "FILENAME")]
        name: Option<String>,

        /// Destinations to upload to, comma-separated or repeated (r2, impossible, wasabi, oracle).
        #[arg(
            long = "to",
            short = 't',
            value_name = "DEST",
            value_delimiter = ',',
            required = true
        )]
        destinations: Vec<Provider>,
    },

    /// Process every pending job, one at a time, and follow progress until the queue is empty.
    Run {
        /// How often to refresh progress output.
        #[arg(long, default_value = "500", value_name = "MS")]
        poll_ms: u64,
    },

    /// Show all jobs, or one job in detail.
    Status {
        /// Job identifier.
        id: Option<JobId>,
    },

    /// Cancel a pending job (removes it from the list).
    Cancel {
        /// Job identifier.
        id: JobId,
    },

    /// Remove every completed or failed job.
    Clear,

    /// Print a job's output log.
    Logs {
        /// Job identifier.
        id: JobId,

        /// Print only the error log.
        #[arg(long)]
        errors: bool,
    },

    /// List destinations and whether they are configured.
    Destinations,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

impl CliCommand {
    pub async fn run(self, cfg: &LiftConfig, state_dir: &Path) -> Result<()> {
        tracing::debug!("loaded config: {:?}", cfg);

        match self {
            CliCommand::Add {
                url,
                name,
                destinations,
            } => {
                let scheduler = open_client(cfg, state_dir).await?;
                run_add(&scheduler, &url, name.as_deref(), &destinations).await?;
            }
            CliCommand::Run { poll_ms } => {
                let scheduler = open_engine(cfg, state_dir).await?;
                run_process(&scheduler, Duration::from_millis(poll_ms.max(50))).await?;
            }
            CliCommand::Status { id } => {
                let scheduler = open_client(cfg, state_dir).await?;
                run_status(&scheduler, id).await?;
            }
            CliCommand::Cancel { id } => {
                let scheduler = open_client(cfg, state_dir).await?;
                run_cancel(&scheduler, id).await?;
            }
            CliCommand::Clear => {
                let scheduler = open_client(cfg, state_dir).await?;
                run_clear(&scheduler).await?;
            }
            CliCommand::Logs { id, errors } => {
                run_logs(&JobLogs::in_state_dir(state_dir), id, errors)?;
            }
            CliCommand::Destinations => {
                run_destinations(&DestinationSet::from_env(cfg.r2_size_limit_bytes));
            }
        }

        Ok(())
    }
}

/// Scheduler that owns the engine lock and runs transfers (`cloudlift run`).
async fn open_engine(cfg: &LiftConfig, state_dir: &Path) -> Result<Scheduler> {
    let scheduler = Scheduler::start(build_executor(cfg, state_dir).await?, lock_path(state_dir)).await?;
    Ok(scheduler.with_keep_job_logs(cfg.keep_job_logs))
}

/// Scheduler for commands that never run transfers; it does not hold the engine lock.
async fn open_client(cfg: &LiftConfig, state_dir: &Path) -> Result<Scheduler> {
    let scheduler = Scheduler::attach(build_executor(cfg, state_dir).await?, lock_path(state_dir)).await?;
    Ok(scheduler.with_keep_job_logs(cfg.keep_job_logs))
}

fn lock_path(state_dir: &Path) -> PathBuf {
    state_dir.join("engine.lock")
}

/// Wire the production engine: SQLite store, curl downloads, S3 uploads.
async fn build_executor(cfg: &LiftConfig, state_dir: &Path) -> Result<Arc<TransferExecutor>> {
    let store = JobStore::open_in(state_dir)
        .await
        .with_context(|| format!("open job store in {}", state_dir.display()))?;
    Ok(Arc::new(TransferExecutor::new(
        store,
        Arc::new(CurlDownloader::default()),
        Arc::new(S3Uploader::new()),
        DestinationSet::from_env(cfg.r2_size_limit_bytes),
        JobLogs::in_state_dir(state_dir),
        TransferSettings::from_config(cfg, state_dir),
    )))
}

#[cfg(test)]
mod tests;
