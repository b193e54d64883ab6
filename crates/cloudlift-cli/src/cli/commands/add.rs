//! `cloudlift add <url> --to <dest>...` – queue a transfer job.

use anyhow::Result;
use cloudlift_core::destinations::Provider;
use cloudlift_core::scheduler::Scheduler;

pub async fn run_add(
    scheduler: &Scheduler,
    url: &str,
    name: Option<&str>,
    destinations: &[Provider],
) -> Result<()> {
    let id = scheduler.enqueue(url, name, destinations).await?;
    let job = scheduler.get(id).await?;
    let targets: Vec<&str> = job.destinations.iter().map(|p| p.display_name()).collect();
    println!(
        "Added job {id}: {} -> {}",
        job.target_filename,
        targets.join(", ")
    );
    Ok(())
}
