//! Shared helpers for cloudlift-core integration tests.

#![allow(dead_code)]

pub mod fakes;
pub mod http_server;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use cloudlift_core::destinations::DestinationSet;
use cloudlift_core::job_log::JobLogs;
use cloudlift_core::job_store::{Job, JobId, JobStore};
use cloudlift_core::scheduler::Scheduler;
use cloudlift_core::transfer::{Downloader, TransferExecutor, TransferSettings, Uploader};
use tempfile::TempDir;

/// Credentials for every provider, so all four destinations are enabled.
pub fn all_destinations(r2_limit: u64) -> DestinationSet {
    let env: HashMap<&str, &str> = [
        ("R2_ACCOUNT_ID", "acct"),
        ("R2_ACCESS_KEY_ID", "r2-key"),
        ("R2_SECRET_ACCESS_KEY", "r2-secret"),
        ("IMPOSSIBLE_ACCESS_KEY_ID", "ic-key"),
        ("IMPOSSIBLE_SECRET_ACCESS_KEY", "ic-secret"),
        ("WASABI_ACCESS_KEY_ID", "wasabi-key"),
        ("WASABI_SECRET_ACCESS_KEY", "wasabi-secret"),
        ("OCI_NAMESPACE", "ns"),
        ("OCI_ACCESS_KEY_ID", "oci-key"),
        ("OCI_SECRET_ACCESS_KEY", "oci-secret"),
    ]
    .into_iter()
    .collect();
    DestinationSet::from_lookup(|k| env.get(k).map(|v| v.to_string()), r2_limit)
}

/// A state dir plus the pieces built from it.
pub struct Harness {
    pub state: TempDir,
    pub store: JobStore,
    pub executor: Arc<TransferExecutor>,
}

impl Harness {
    pub async fn new(
        downloader: Arc<dyn Downloader>,
        uploader: Arc<dyn Uploader>,
        destinations: DestinationSet,
    ) -> Self {
        let state = tempfile::tempdir().unwrap();
        Self::in_dir(state, downloader, uploader, destinations).await
    }

    pub async fn in_dir(
        state: TempDir,
        downloader: Arc<dyn Downloader>,
        uploader: Arc<dyn Uploader>,
        destinations: DestinationSet,
    ) -> Self {
        let store = JobStore::open_in(state.path()).await.unwrap();
        let settings = TransferSettings {
            staging_dir: state.path().join("staging"),
            progress_interval: Duration::from_millis(10),
            count_bucket_usage: true,
            share_url_ttl: Duration::from_secs(3600),
        };
        let executor = Arc::new(TransferExecutor::new(
            store.clone(),
            downloader,
            uploader,
            destinations,
            JobLogs::in_state_dir(state.path()),
            settings,
        ));
        Self {
            state,
            store,
            executor,
        }
    }

    pub async fn scheduler(&self) -> Scheduler {
        Scheduler::start(Arc::clone(&self.executor), self.state.path().join("engine.lock"))
            .await
            .unwrap()
    }

    /// A scheduler that never takes the engine lock.
    pub async fn client(&self) -> Scheduler {
        Scheduler::attach(Arc::clone(&self.executor), self.state.path().join("engine.lock"))
            .await
            .unwrap()
    }

    pub fn logs(&self) -> &JobLogs {
        self.executor.logs()
    }
}

/// Poll until `pred` holds for the job, or panic after a few seconds.
pub async fn wait_for(store: &JobStore, id: JobId, pred: impl Fn(&Job) -> bool) -> Job {
    for _ in 0..500 {
        let job = store.get(id).await.unwrap();
        if pred(&job) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not reach the expected state", id);
}
