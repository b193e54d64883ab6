//! Errors surfaced synchronously by the job engine.
//!
//! Transfer failures (download, per-destination upload) are not part of this
//! type: they are captured into the job record as data. See
//! [`crate::transfer::DownloadError`] and [`crate::transfer::UploadError`].

use thiserror::Error;

use crate::job_store::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input at enqueue time; the job is never created.
    #[error("invalid job request: {0}")]
    Validation(String),

    /// Operation not legal for the job's current status.
    #[error("job {id} is {status}; cannot {action}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("job store: {0}")]
    Store(#[from] sqlx::Error),

    #[error("job record encoding: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True for errors caused by the caller's request rather than infrastructure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::InvalidState { .. } | EngineError::NotFound(_)
        )
    }
}
