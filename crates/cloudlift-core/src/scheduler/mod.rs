//! Job scheduler: enqueue, process-all with a single active slot, cancel,
//! clear, and startup reconciliation.
//!
//! `process_all` hands the queue to a background coordinator and returns at
//! once. The coordinator claims the oldest pending job, runs its transfer in
//! its own task, settles it, and repeats until no pending job remains.

pub mod lifecycle;
pub mod lock;
pub mod outcome;
pub mod slot;

use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};

use crate::destinations::{DestinationSet, Provider};
use crate::error::EngineError;
use crate::job_store::{Job, JobId, JobStatus, JobStore, NewJob};
use crate::transfer::TransferExecutor;
use crate::url_model;

pub use lock::EngineLock;
pub use outcome::INTERRUPTED_BY_RESTART;
pub use slot::{ActiveSlot, SlotGuard};

/// Result of [`Scheduler::process_all`].
#[derive(Debug)]
pub enum ProcessAll {
    /// A coordinator is now working through the pending jobs.
    Started(RunHandle),
    NothingPending,
    /// Another coordinator is active here, or this scheduler does not own the engine.
    Busy,
}

/// Handle to a running coordinator.
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<u32>,
}

impl RunHandle {
    /// Wait for the coordinator to drain the queue. Returns the number of jobs it ran.
    pub async fn wait(self) -> u32 {
        match self.handle.await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "coordinator task failed");
                0
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

pub struct Scheduler {
    store: JobStore,
    executor: Arc<TransferExecutor>,
    slot: ActiveSlot,
    /// Present when this process owns the engine.
    engine_lock: Option<Arc<EngineLock>>,
    workers_started: Arc<AtomicU64>,
    keep_job_logs: bool,
}

impl Scheduler {
    /// Create the engine-owning scheduler. If this process takes the engine
    /// lock, jobs left active by a previous process are failed with
    /// [`INTERRUPTED_BY_RESTART`], and the lock is held until the scheduler drops.
    pub async fn start(
        executor: Arc<TransferExecutor>,
        lock_path: impl AsRef<Path>,
    ) -> Result<Self, EngineError> {
        let engine_lock = take_engine(executor.store(), lock_path.as_ref()).await?;
        Ok(Self::with_engine(executor, engine_lock.map(Arc::new)))
    }

    /// Create a client scheduler that never runs transfers: it can enqueue,
    /// list, cancel and clear, and `process_all` always reports `Busy`.
    ///
    /// When no engine is running, interrupted jobs are reconciled and the
    /// lock is released again before this returns.
    pub async fn attach(
        executor: Arc<TransferExecutor>,
        lock_path: impl AsRef<Path>,
    ) -> Result<Self, EngineError> {
        drop(take_engine(executor.store(), lock_path.as_ref()).await?);
        Ok(Self::with_engine(executor, None))
    }

    fn with_engine(executor: Arc<TransferExecutor>, engine_lock: Option<Arc<EngineLock>>) -> Self {
        Self {
            store: executor.store().clone(),
            executor,
            slot: ActiveSlot::new(),
            engine_lock,
            workers_started: Arc::new(AtomicU64::new(0)),
            keep_job_logs: false,
        }
    }

    /// Keep job log files when jobs are cancelled or cleared.
    pub fn with_keep_job_logs(mut self, keep: bool) -> Self {
        self.keep_job_logs = keep;
        self
    }

    pub fn owns_engine(&self) -> bool {
        self.engine_lock.is_some()
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn destinations(&self) -> &DestinationSet {
        self.executor.destinations()
    }

    pub async fn get(&self, id: JobId) -> Result<Job, EngineError> {
        self.store.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<Job>, EngineError> {
        self.store.list().await
    }

    /// Validate and create a `pending` job. Nothing is stored when validation fails.
    pub async fn enqueue(
        &self,
        url: &str,
        filename_override: Option<&str>,
        destinations: &[Provider],
    ) -> Result<JobId, EngineError> {
        let parsed = url_model::validate_source_url(url)?;
        let destinations = self.validate_destinations(destinations)?;
        let target_filename = url_model::resolve_target_filename(parsed.as_str(), filename_override)?;

        let id = self
            .store
            .create(&NewJob {
                source_url: parsed.to_string(),
                target_filename: target_filename.clone(),
                destinations,
            })
            .await?;
        tracing::info!(job_id = id, url = %parsed, filename = %target_filename, "job enqueued");
        Ok(id)
    }

    /// De-duplicate (keeping first occurrence) and require every provider to be enabled.
    fn validate_destinations(&self, requested: &[Provider]) -> Result<Vec<Provider>, EngineError> {
        if requested.is_empty() {
            return Err(EngineError::Validation(
                "select at least one destination".into(),
            ));
        }
        let set = self.executor.destinations();
        let mut out = Vec::with_capacity(requested.len());
        for &provider in requested {
            if out.contains(&provider) {
                continue;
            }
            if !set.is_enabled(provider) {
                let missing = set
                    .disabled()
                    .iter()
                    .find(|d| d.provider == provider)
                    .map(|d| d.missing.join(", "))
                    .unwrap_or_default();
                return Err(EngineError::Validation(if missing.is_empty() {
                    format!("{} is not configured", provider.display_name())
                } else {
                    format!(
                        "{} is not configured (missing {})",
                        provider.display_name(),
                        missing
                    )
                }));
            }
            out.push(provider);
        }
        Ok(out)
    }

    /// Start working through the pending jobs in the background.
    pub async fn process_all(&self) -> Result<ProcessAll, EngineError> {
        let Some(engine_lock) = self.engine_lock.clone() else {
            return Ok(ProcessAll::Busy);
        };
        let Some(guard) = self.slot.try_acquire() else {
            return Ok(ProcessAll::Busy);
        };
        if self.store.count_with_status(JobStatus::Pending).await? == 0 {
            return Ok(ProcessAll::NothingPending);
        }

        let store = self.store.clone();
        let executor = Arc::clone(&self.executor);
        let workers = Arc::clone(&self.workers_started);
        let slot = self.slot.clone();
        let handle = tokio::spawn(async move {
            let _engine = engine_lock;
            let mut guard = guard;
            let mut processed = 0;
            loop {
                let (ran, end) = coordinate(&store, &executor, &workers).await;
                processed += ran;
                drop(guard);
                if end == QueueEnd::Halted {
                    break;
                }
                // A process_all refused while the queue drained may have left a job pending.
                match store.count_with_status(JobStatus::Pending).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "pending recheck failed");
                        break;
                    }
                }
                match slot.try_acquire() {
                    Some(next) => guard = next,
                    // Another coordinator took over the queue.
                    None => break,
                }
            }
            processed
        });
        Ok(ProcessAll::Started(RunHandle { handle }))
    }

    /// Cancel a pending job: the record is deleted and returned with status `cancelled`.
    pub async fn cancel(&self, id: JobId) -> Result<Job, EngineError> {
        let mut job = self
            .store
            .remove_if(id, |job| {
                if job.status.can_transition_to(JobStatus::Cancelled) {
                    Ok(())
                } else {
                    Err(EngineError::InvalidState {
                        id: job.id,
                        status: job.status,
                        action: JobStatus::transition_action(JobStatus::Cancelled),
                    })
                }
            })
            .await?;
        self.remove_logs(&[id]);
        tracing::info!(job_id = id, "job cancelled");
        job.status = JobStatus::Cancelled;
        Ok(job)
    }

    /// Delete every completed or failed job. Returns how many were removed.
    pub async fn clear_terminal(&self) -> Result<u64, EngineError> {
        let ids = self.store.delete_terminal().await?;
        self.remove_logs(&ids);
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "cleared finished jobs");
        }
        Ok(ids.len() as u64)
    }

    fn remove_logs(&self, ids: &[JobId]) {
        if self.keep_job_logs {
            return;
        }
        for &id in ids {
            if let Err(e) = self.executor.logs().remove(id) {
                tracing::warn!(job_id = id, error = %e, "failed to remove job logs");
            }
        }
    }
}

/// Try to take the engine lock; reconcile interrupted jobs when it is ours.
async fn take_engine(store: &JobStore, lock_path: &Path) -> Result<Option<EngineLock>, EngineError> {
    let Some(lock) = EngineLock::try_acquire(lock_path)? else {
        tracing::debug!(lock = %lock_path.display(), "engine owned by another process");
        return Ok(None);
    };
    let reconciled = lifecycle::reconcile(store).await?;
    if !reconciled.is_empty() {
        tracing::info!(count = reconciled.len(), "reconciled interrupted jobs");
    }
    Ok(Some(lock))
}

/// Settle attempts before the coordinator gives up on a job.
const SETTLE_ATTEMPTS: u32 = 3;
const SETTLE_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueEnd {
    /// No pending job was left to claim.
    Drained,
    /// A job could not be settled; it stays active until the next engine start.
    Halted,
}

/// Claim, run and settle pending jobs one at a time until none remain.
///
/// A job that cannot be settled is still active in the store, so no further
/// job is claimed after it.
async fn coordinate(
    store: &JobStore,
    executor: &Arc<TransferExecutor>,
    workers: &AtomicU64,
) -> (u32, QueueEnd) {
    let mut processed = 0;
    loop {
        let n = workers.fetch_add(1, Ordering::Relaxed) + 1;
        let worker_handle = format!("pid:{}/worker:{}", std::process::id(), n);
        let job = match store.claim_next_pending(&worker_handle).await {
            Ok(Some(job)) => job,
            Ok(None) => return (processed, QueueEnd::Drained),
            Err(e) => {
                tracing::error!(error = %e, "claiming next pending job failed");
                return (processed, QueueEnd::Halted);
            }
        };
        let id = job.id;
        tracing::info!(job_id = id, worker = %worker_handle, "transfer started");

        let task_executor = Arc::clone(executor);
        let task = tokio::spawn(async move { task_executor.run(&job).await });
        let crash = match task.await {
            Ok(Ok(_report)) => None,
            Ok(Err(e)) => Some(format!("transfer worker failed: {}", e)),
            Err(e) => Some(format!("transfer worker crashed: {}", join_error_message(e))),
        };
        if let Some(msg) = &crash {
            tracing::error!(job_id = id, "{}", msg);
            executor.logs().open(id).error(msg);
        }
        processed += 1;

        if let Err(e) = settle(store, id, crash.as_deref()).await {
            tracing::error!(
                job_id = id,
                error = %e,
                "settling job failed; no further jobs start until the next engine start"
            );
            executor
                .logs()
                .open(id)
                .error(format!("could not record the final status: {}", e));
            return (processed, QueueEnd::Halted);
        }
    }
}

/// [`lifecycle::finish`] with retries for store failures. A job deleted
/// underneath the coordinator counts as settled.
async fn settle(store: &JobStore, id: JobId, crash: Option<&str>) -> Result<(), EngineError> {
    let mut attempt = 1;
    loop {
        match lifecycle::finish(store, id, crash).await {
            Ok(job) => {
                tracing::info!(job_id = id, status = %job.status, "transfer finished");
                return Ok(());
            }
            Err(EngineError::NotFound(_)) => {
                tracing::warn!(job_id = id, "job removed before it was settled");
                return Ok(());
            }
            Err(e) if e.is_rejection() || attempt >= SETTLE_ATTEMPTS => return Err(e),
            Err(e) => {
                tracing::warn!(job_id = id, attempt, error = %e, "settling job failed; retrying");
                attempt += 1;
                tokio::time::sleep(SETTLE_RETRY_DELAY).await;
            }
        }
    }
}

fn join_error_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
