//! `cloudlift status [id]` – show jobs.

use anyhow::Result;
use cloudlift_core::job_store::{DestinationOutcome, Job, JobId, JobStatus};
use cloudlift_core::scheduler::Scheduler;

pub async fn run_status(scheduler: &Scheduler, id: Option<JobId>) -> Result<()> {
    match id {
        Some(id) => print_detail(&scheduler.get(id).await?),
        None => print_table(&scheduler.list().await?),
    }
    Ok(())
}

fn print_table(jobs: &[Job]) {
    if jobs.is_empty() {
        println!("No jobs.");
        return;
    }
    println!(
        "{:<6} {:<12} {:<40} {:<28} {}",
        "ID", "STATUS", "PROGRESS", "FILE", "DESTINATIONS"
    );
    for job in jobs {
        println!(
            "{:<6} {:<12} {:<40} {:<28} {}",
            job.id,
            job.status.as_str(),
            progress_column(job),
            job.target_filename,
            destination_summary(job)
        );
    }
}

fn print_detail(job: &Job) {
    println!("Job {}", job.id);
    println!("  url:      {}", job.source_url);
    println!("  file:     {}", job.target_filename);
    println!("  status:   {}", job.status);
    println!("  progress: {}", progress_column(job));
    if let Some(err) = &job.error_message {
        println!("  error:    {err}");
    }
    println!("  destinations:");
    for provider in &job.destinations {
        let line = match job.result(*provider) {
            None => "-".to_string(),
            Some(r) => match r.outcome {
                DestinationOutcome::Succeeded => match &r.share_url {
                    Some(url) => format!("succeeded, {url}"),
                    None => "succeeded".to_string(),
                },
                DestinationOutcome::Skipped => r.detail.clone().unwrap_or_else(|| "skipped".into()),
                DestinationOutcome::Failed => format!(
                    "failed: {}",
                    r.error_message.as_deref().unwrap_or("unknown error")
                ),
            },
        };
        println!("    {:<16} {}", provider.display_name(), line);
    }
}

/// Percentage plus message while active; the last message otherwise.
pub(crate) fn progress_column(job: &Job) -> String {
    let p = &job.progress;
    if job.status.is_active() {
        let pct = p
            .fraction()
            .map(|f| format!("{:>3.0}% ", f * 100.0))
            .unwrap_or_default();
        let target = p
            .destination
            .map(|d| format!("[{}] ", d.as_str()))
            .unwrap_or_default();
        return format!("{target}{pct}{}", p.message);
    }
    match job.status {
        JobStatus::Pending => "queued".to_string(),
        _ if p.message.is_empty() => "-".to_string(),
        _ => p.message.clone(),
    }
}

/// `r2:ok wasabi:failed oracle:-` style summary of per-destination results.
pub(crate) fn destination_summary(job: &Job) -> String {
    job.destinations
        .iter()
        .map(|p| {
            let state = match job.result(*p).map(|r| r.outcome) {
                Some(DestinationOutcome::Succeeded) => "ok",
                Some(DestinationOutcome::Skipped) => "skipped",
                Some(DestinationOutcome::Failed) => "failed",
                None => "-",
            };
            format!("{}:{}", p.as_str(), state)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
