//! In-memory Downloader/Uploader doubles.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use cloudlift_core::destinations::{Destination, Provider};
use cloudlift_core::transfer::{DownloadError, Downloader, ProgressFn, UploadError, Uploader};

#[derive(Debug, Clone)]
pub enum FakeDownload {
    Body(Vec<u8>),
    Fail(String),
    Panic,
}

/// Serves a fixed behavior per URL (default: a small body).
pub struct FakeDownloader {
    routes: HashMap<String, FakeDownload>,
    default: FakeDownload,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn with_body(body: Vec<u8>) -> Self {
        Self {
            routes: HashMap::new(),
            default: FakeDownload::Body(body),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, url: &str, behavior: FakeDownload) -> Self {
        self.routes.insert(url.to_string(), behavior);
        self
    }

    /// Hold every download open this long (to observe the active job).
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Most downloads ever running at the same time.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// URLs in the order they were downloaded.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressFn,
    ) -> Result<u64, DownloadError> {
        self.requested.lock().unwrap().push(url.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let behavior = self.routes.get(url).unwrap_or(&self.default).clone();
        let result = match behavior {
            FakeDownload::Body(body) => {
                let total = body.len() as u64;
                let written = tokio::fs::write(dest, &body)
                    .await
                    .map(|()| total)
                    .map_err(|e| DownloadError::new(e.to_string()));
                if written.is_ok() {
                    on_progress(total / 2, Some(total));
                    on_progress(total, Some(total));
                }
                written
            }
            FakeDownload::Fail(reason) => Err(DownloadError::new(reason)),
            FakeDownload::Panic => {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("downloader exploded");
            }
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[derive(Debug, Clone)]
pub enum FakeUpload {
    Succeed,
    Fail(String),
    Panic,
}

/// Records uploads; behavior and bucket usage are configured per provider.
pub struct FakeUploader {
    behavior: HashMap<Provider, FakeUpload>,
    usage: HashMap<Provider, u64>,
    uploads: Mutex<Vec<(Provider, String, u64)>>,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self {
            behavior: HashMap::new(),
            usage: HashMap::new(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, provider: Provider, behavior: FakeUpload) -> Self {
        self.behavior.insert(provider, behavior);
        self
    }

    pub fn usage(mut self, provider: Provider, bytes: u64) -> Self {
        self.usage.insert(provider, bytes);
        self
    }

    /// `(provider, key, bytes)` for every successful upload, in order.
    pub fn uploads(&self) -> Vec<(Provider, String, u64)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    async fn upload(
        &self,
        destination: &Destination,
        local_path: &Path,
        remote_key: &str,
        on_progress: ProgressFn,
    ) -> Result<(), UploadError> {
        let provider = destination.provider;
        let size = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| UploadError::new(provider, e.to_string()))?
            .len();
        match self.behavior.get(&provider).cloned().unwrap_or(FakeUpload::Succeed) {
            FakeUpload::Succeed => {
                on_progress(size, Some(size));
                self.uploads
                    .lock()
                    .unwrap()
                    .push((provider, remote_key.to_string(), size));
                Ok(())
            }
            FakeUpload::Fail(reason) => Err(UploadError::new(provider, reason)),
            FakeUpload::Panic => panic!("uploader exploded"),
        }
    }

    async fn bucket_usage(&self, destination: &Destination) -> Result<u64, UploadError> {
        Ok(self.usage.get(&destination.provider).copied().unwrap_or(0))
    }
}
