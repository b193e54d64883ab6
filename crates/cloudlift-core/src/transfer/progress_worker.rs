//! Background task that persists progress snapshots to the job store.
//!
//! Transfer callbacks run on libcurl or SDK threads and must never wait on the
//! database, so snapshots go through a small channel. The loop writes only the
//! newest snapshot it has; older ones queued behind it are dropped.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ProgressFn;
use crate::job_store::{JobId, JobProgress, JobStore};
use crate::progress::ProgressReporter;

const CHANNEL_CAPACITY: usize = 8;

/// Sender side handed to transfer callbacks; the loop ends once every clone is dropped.
pub(super) struct ProgressSink {
    tx: mpsc::Sender<JobProgress>,
    handle: JoinHandle<()>,
}

impl ProgressSink {
    pub(super) fn spawn(store: JobStore, job_id: JobId) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(run_progress_persistence_loop(rx, store, job_id));
        Self { tx, handle }
    }

    /// Callback that feeds raw byte counts through `reporter` into the loop.
    pub(super) fn callback(&self, reporter: Arc<Mutex<ProgressReporter>>) -> ProgressFn {
        let tx = self.tx.clone();
        Arc::new(move |bytes_done, total| {
            let snapshot = match reporter.lock() {
                Ok(mut r) => r.observe(bytes_done, total),
                Err(_) => None,
            };
            if let Some(snapshot) = snapshot {
                // Full channel: the loop is behind and will catch up with a later snapshot.
                let _ = tx.try_send(snapshot);
            }
        })
    }

    /// Wait until every queued snapshot has been written.
    pub(super) async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "progress writer join failed");
        }
    }
}

async fn run_progress_persistence_loop(
    mut rx: mpsc::Receiver<JobProgress>,
    store: JobStore,
    job_id: JobId,
) {
    while let Some(mut latest) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            latest = newer;
        }
        let result = store
            .update(job_id, move |job| {
                job.progress = latest;
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(job_id, error = %e, "progress update failed");
        }
    }
}
