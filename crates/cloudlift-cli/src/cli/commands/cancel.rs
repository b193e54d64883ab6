//! `cloudlift cancel <id>` – cancel a pending job.

use anyhow::Result;
use cloudlift_core::job_store::JobId;
use cloudlift_core::scheduler::Scheduler;

pub async fn run_cancel(scheduler: &Scheduler, id: JobId) -> Result<()> {
    let job = scheduler.cancel(id).await?;
    println!("Cancelled job {id} ({})", job.target_filename);
    Ok(())
}
