//! `cloudlift run` – drain the pending queue and follow progress.

use anyhow::Result;
use cloudlift_core::job_store::{JobId, JobStatus};
use cloudlift_core::scheduler::{ProcessAll, Scheduler};
use std::collections::HashMap;
use std::time::Duration;

use super::status::{destination_summary, progress_column};

pub async fn run_process(scheduler: &Scheduler, poll: Duration) -> Result<()> {
    let mut watched: Vec<JobId> = scheduler
        .list()
        .await?
        .into_iter()
        .filter(|j| j.status == JobStatus::Pending)
        .map(|j| j.id)
        .collect();

    let handle = match scheduler.process_all().await? {
        ProcessAll::Started(handle) => handle,
        ProcessAll::NothingPending => {
            println!("No pending jobs.");
            return Ok(());
        }
        ProcessAll::Busy => {
            println!("Another cloudlift process is running transfers; use `cloudlift status` to follow them.");
            return Ok(());
        }
    };

    let mut last_line: HashMap<JobId, String> = HashMap::new();
    loop {
        let finished = handle.is_finished();
        for job in scheduler.store().active_jobs().await? {
            if !watched.contains(&job.id) {
                watched.push(job.id);
            }
            let line = format!("job {} {:<11} {}", job.id, job.status.as_str(), progress_column(&job));
            if last_line.get(&job.id) != Some(&line) {
                println!("{line}");
                last_line.insert(job.id, line);
            }
        }
        if finished {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    let ran = handle.wait().await;
    for id in watched {
        // Jobs cancelled before they were claimed are gone.
        let Ok(job) = scheduler.get(id).await else {
            continue;
        };
        if !job.status.is_terminal() {
            continue;
        }
        match &job.error_message {
            Some(err) if job.status == JobStatus::Failed => {
                println!("job {} failed: {err}", job.id)
            }
            _ => println!(
                "job {} {}: {}",
                job.id,
                job.status,
                destination_summary(&job)
            ),
        }
    }
    println!("Processed {ran} job(s).");
    Ok(())
}
