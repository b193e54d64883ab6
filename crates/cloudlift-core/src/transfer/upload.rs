//! Upload capability: one implementation serves every provider, configured
//! per call by the [`Destination`].

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::ProgressFn;
use crate::destinations::{Destination, Provider};

/// Per-destination upload failure. Isolated to that destination.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("upload to {} failed: {}", .provider.display_name(), .reason)]
pub struct UploadError {
    pub provider: Provider,
    pub reason: String,
}

impl UploadError {
    pub fn new(provider: Provider, reason: impl Into<String>) -> Self {
        Self {
            provider,
            reason: reason.into(),
        }
    }
}

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload `local_path` as `remote_key` into the destination's bucket.
    /// Calls `on_progress(bytes_sent, Some(total))` as parts complete.
    async fn upload(
        &self,
        destination: &Destination,
        local_path: &Path,
        remote_key: &str,
        on_progress: ProgressFn,
    ) -> Result<(), UploadError>;

    /// Bytes already stored in the destination's bucket. Used by the capacity check.
    async fn bucket_usage(&self, _destination: &Destination) -> Result<u64, UploadError> {
        Ok(0)
    }

    /// URL a user can fetch the uploaded object from, if the provider offers one.
    async fn share_url(
        &self,
        destination: &Destination,
        remote_key: &str,
        _ttl: Duration,
    ) -> Result<Option<String>, UploadError> {
        Ok(destination.public_object_url(remote_key))
    }
}
