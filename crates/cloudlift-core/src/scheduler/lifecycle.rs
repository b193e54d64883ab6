//! Status transitions issued by the engine. Every status change outside the
//! job store's own `claim_next_pending` goes through here.

use crate::error::EngineError;
use crate::job_store::{Job, JobId, JobStatus, JobStore};

use super::outcome;

/// `downloading → uploading`, once the staged file is complete.
pub async fn begin_upload(store: &JobStore, id: JobId) -> Result<Job, EngineError> {
    store
        .update(id, |job| {
            job.status = JobStatus::Uploading;
            Ok(())
        })
        .await
}

/// Settle a job whose transfer task has ended. `crash` carries the message
/// when the task did not return normally.
pub async fn finish(store: &JobStore, id: JobId, crash: Option<&str>) -> Result<Job, EngineError> {
    let crash = crash.map(str::to_string);
    store
        .update(id, move |job| {
            outcome::settle(job, crash.as_deref());
            Ok(())
        })
        .await
}

/// Fail every job left `downloading`/`uploading` by a previous process.
/// Returns the ids that were reconciled.
pub async fn reconcile(store: &JobStore) -> Result<Vec<JobId>, EngineError> {
    let mut reconciled = Vec::new();
    for job in store.active_jobs().await? {
        store
            .update(job.id, |j| {
                outcome::interrupt(j);
                Ok(())
            })
            .await?;
        tracing::warn!(job_id = job.id, status = %job.status, "job {}", outcome::INTERRUPTED_BY_RESTART);
        reconciled.push(job.id);
    }
    Ok(reconciled)
}
