//! Transfer executor: one download, then sequential uploads, for a single job.
//!
//! The executor owns no job status except the `downloading → uploading`
//! edge (through [`crate::scheduler::lifecycle`]); it records progress,
//! per-destination results and the download error, and the scheduler settles
//! the final status from the durable record once the executor's task ends.

pub mod download;
pub mod s3;
pub mod upload;

mod progress_worker;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::capacity::CapacityChecker;
use crate::config::LiftConfig;
use crate::destinations::{DestinationSet, Provider};
use crate::error::EngineError;
use crate::job_log::{JobLog, JobLogs};
use crate::job_store::{DestinationResult, Job, JobId, JobProgress, JobStore, TransferPhase};
use crate::progress::ProgressReporter;
use crate::scheduler::lifecycle;

pub use download::{CurlDownloader, DownloadError, Downloader};
pub use s3::S3Uploader;
pub use upload::{UploadError, Uploader};

use progress_worker::ProgressSink;

/// Progress callback: `(bytes_done, bytes_total_if_known)`.
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Executor settings derived from [`LiftConfig`] and the state dir.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub staging_dir: PathBuf,
    pub progress_interval: Duration,
    pub count_bucket_usage: bool,
    pub share_url_ttl: Duration,
}

impl TransferSettings {
    pub fn from_config(cfg: &LiftConfig, state_dir: &Path) -> Self {
        Self {
            staging_dir: state_dir.join("staging"),
            progress_interval: cfg.progress_interval(),
            count_bucket_usage: cfg.count_bucket_usage,
            share_url_ttl: cfg.share_url_ttl(),
        }
    }
}

/// What one executor run did, as seen by the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    pub job_id: JobId,
    /// Bytes downloaded; None when the download failed.
    pub size_bytes: Option<u64>,
    pub download_error: Option<DownloadError>,
    pub results: BTreeMap<Provider, DestinationResult>,
}

pub struct TransferExecutor {
    store: JobStore,
    downloader: Arc<dyn Downloader>,
    uploader: Arc<dyn Uploader>,
    destinations: DestinationSet,
    capacity: CapacityChecker,
    logs: JobLogs,
    settings: TransferSettings,
}

impl TransferExecutor {
    pub fn new(
        store: JobStore,
        downloader: Arc<dyn Downloader>,
        uploader: Arc<dyn Uploader>,
        destinations: DestinationSet,
        logs: JobLogs,
        settings: TransferSettings,
    ) -> Self {
        let capacity = CapacityChecker::from_destinations(&destinations);
        Self {
            store,
            downloader,
            uploader,
            destinations,
            capacity,
            logs,
            settings,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn destinations(&self) -> &DestinationSet {
        &self.destinations
    }

    pub fn logs(&self) -> &JobLogs {
        &self.logs
    }

    /// `<staging_dir>/<id>_<target_filename>`.
    pub fn staged_path(&self, job: &Job) -> PathBuf {
        self.settings
            .staging_dir
            .join(format!("{}_{}", job.id, job.target_filename))
    }

    /// Run the transfer for a job the scheduler has already moved to `downloading`.
    ///
    /// Transfer failures are recorded on the job and reflected in the report;
    /// only job store failures are returned as errors. The staged file is
    /// removed in every case.
    pub async fn run(&self, job: &Job) -> Result<TransferReport, EngineError> {
        let log = self.logs.open(job.id);
        log.info(format!(
            "job {} started: {} -> {} ({})",
            job.id,
            job.source_url,
            job.target_filename,
            provider_list(&job.destinations)
        ));
        let staged = self.staged_path(job);

        let result = self.run_phases(job, &staged, &log).await;

        match tokio::fs::remove_file(&staged).await {
            Ok(()) => log.info(format!("removed staged file {}", staged.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(job_id = job.id, path = %staged.display(), error = %e, "failed to remove staged file");
                log.error(format!("failed to remove staged file {}: {}", staged.display(), e));
            }
        }
        if let Err(e) = &result {
            log.error(format!("job store error: {}", e));
        }
        result
    }

    async fn run_phases(
        &self,
        job: &Job,
        staged: &Path,
        log: &JobLog,
    ) -> Result<TransferReport, EngineError> {
        let size = match self.download_phase(job, staged, log).await? {
            Ok(size) => size,
            Err(e) => {
                return Ok(TransferReport {
                    job_id: job.id,
                    size_bytes: None,
                    download_error: Some(e),
                    results: BTreeMap::new(),
                })
            }
        };

        lifecycle::begin_upload(&self.store, job.id).await?;
        let mut results = BTreeMap::new();
        for &provider in &job.destinations {
            let result = self.upload_one(job, provider, staged, size, log).await;
            let recorded = result.clone();
            self.store
                .update(job.id, move |j| {
                    j.results.insert(provider, recorded);
                    Ok(())
                })
                .await?;
            results.insert(provider, result);
        }
        log.info("all destinations attempted");

        Ok(TransferReport {
            job_id: job.id,
            size_bytes: Some(size),
            download_error: None,
            results,
        })
    }

    /// Outer error: job store failure. Inner error: the download failed (already recorded).
    async fn download_phase(
        &self,
        job: &Job,
        staged: &Path,
        log: &JobLog,
    ) -> Result<Result<u64, DownloadError>, EngineError> {
        log.info(format!("downloading {} to {}", job.source_url, staged.display()));
        let reporter = Arc::new(Mutex::new(ProgressReporter::new(
            TransferPhase::Downloading,
            None,
            self.settings.progress_interval,
        )));

        let result = match tokio::fs::create_dir_all(&self.settings.staging_dir).await {
            Ok(()) => {
                let sink = ProgressSink::spawn(self.store.clone(), job.id);
                let result = self
                    .downloader
                    .download(&job.source_url, staged, sink.callback(Arc::clone(&reporter)))
                    .await;
                sink.close().await;
                result
            }
            Err(e) => Err(DownloadError::new(format!(
                "create staging dir {}: {}",
                self.settings.staging_dir.display(),
                e
            ))),
        };
        let result = result.and_then(|size| {
            if size == 0 {
                Err(DownloadError::new("server returned an empty body"))
            } else {
                Ok(size)
            }
        });

        match result {
            Ok(size) => {
                let snapshot = reporter
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .finish(size);
                log.info(format!("download complete: {}", snapshot.message));
                self.store
                    .update(job.id, move |j| {
                        j.progress = snapshot;
                        Ok(())
                    })
                    .await?;
                Ok(Ok(size))
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, error = %e, "download failed");
                log.error(e.to_string());
                let message = e.to_string();
                self.store
                    .update(job.id, move |j| {
                        j.progress = JobProgress::note(Some(TransferPhase::Downloading), &message);
                        j.error_message = Some(message);
                        Ok(())
                    })
                    .await?;
                Ok(Err(e))
            }
        }
    }

    /// Capacity check, then upload. Never fails: errors become a `failed` result.
    async fn upload_one(
        &self,
        job: &Job,
        provider: Provider,
        staged: &Path,
        size: u64,
        log: &JobLog,
    ) -> DestinationResult {
        let Some(destination) = self.destinations.get(provider) else {
            let msg = format!("{} is not configured", provider.display_name());
            log.error(&msg);
            return DestinationResult::failed(msg);
        };

        if self.capacity.limit(provider).is_some() {
            let usage = if self.settings.count_bucket_usage {
                match self.uploader.bucket_usage(destination).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(job_id = job.id, %provider, error = %e, "bucket usage unavailable; counting as empty");
                        log.error(format!("{}; counting bucket usage as 0", e));
                        0
                    }
                }
            } else {
                0
            };
            if let Some(reason) = self.capacity.skip_reason(provider, size.saturating_add(usage)) {
                log.info(format!("{}: {}", provider.display_name(), reason));
                return DestinationResult::skipped(reason);
            }
        }

        log.info(format!(
            "uploading to {} bucket {}",
            provider.display_name(),
            destination.bucket
        ));
        let mut reporter = ProgressReporter::new(
            TransferPhase::Uploading,
            Some(provider),
            self.settings.progress_interval,
        );
        reporter.set_total(Some(size));
        let reporter = Arc::new(Mutex::new(reporter));

        let sink = ProgressSink::spawn(self.store.clone(), job.id);
        let result = self
            .uploader
            .upload(
                destination,
                staged,
                &job.target_filename,
                sink.callback(Arc::clone(&reporter)),
            )
            .await;
        sink.close().await;

        match result {
            Ok(()) => {
                let snapshot = reporter
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .finish(size);
                log.info(format!(
                    "upload to {} complete: {}",
                    provider.display_name(),
                    snapshot.message
                ));
                if let Err(e) = self
                    .store
                    .update(job.id, move |j| {
                        j.progress = snapshot;
                        Ok(())
                    })
                    .await
                {
                    tracing::warn!(job_id = job.id, error = %e, "progress update failed");
                }
                let share_url = match self
                    .uploader
                    .share_url(destination, &job.target_filename, self.settings.share_url_ttl)
                    .await
                {
                    Ok(url) => url,
                    Err(e) => {
                        log.error(format!("share url for {}: {}", provider.display_name(), e));
                        None
                    }
                };
                if let Some(url) = &share_url {
                    log.info(format!("{} share url: {}", provider.display_name(), url));
                }
                DestinationResult::succeeded(share_url)
            }
            Err(e) => {
                tracing::warn!(job_id = job.id, %provider, error = %e, "upload failed");
                log.error(e.to_string());
                DestinationResult::failed(e.reason)
            }
        }
    }
}

fn provider_list(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}
