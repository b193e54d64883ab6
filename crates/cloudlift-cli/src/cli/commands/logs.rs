//! `cloudlift logs <id> [--errors]` – print a job's log file.

use anyhow::{Context, Result};
use cloudlift_core::job_log::JobLogs;
use cloudlift_core::job_store::JobId;

pub fn run_logs(logs: &JobLogs, id: JobId, errors_only: bool) -> Result<()> {
    let (text, path) = if errors_only {
        (logs.read_errors(id), logs.error_path(id))
    } else {
        (logs.read_output(id), logs.output_path(id))
    };
    let text = text.with_context(|| format!("read {}", path.display()))?;
    if text.is_empty() {
        println!("No log entries for job {id}.");
    } else {
        print!("{text}");
    }
    Ok(())
}
