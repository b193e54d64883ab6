//! `cloudlift clear` – remove finished jobs.

use anyhow::Result;
use cloudlift_core::scheduler::Scheduler;

pub async fn run_clear(scheduler: &Scheduler) -> Result<()> {
    match scheduler.clear_terminal().await? {
        0 => println!("No finished jobs to clear."),
        n => println!("Cleared {n} finished job(s)."),
    }
    Ok(())
}
