//! Types used by the job store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::destinations::Provider;

/// Job identifier.
pub type JobId = i64;

/// Job status stored as a string in the database.
///
/// Edges: `pending → downloading → uploading → completed`,
/// `downloading | uploading → failed`, `pending → cancelled`.
/// `cancelled` is never stored: cancelling deletes the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Uploading => "uploading",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => JobStatus::Pending,
            "downloading" => JobStatus::Downloading,
            "uploading" => JobStatus::Uploading,
            "completed" => JobStatus::Completed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        }
    }

    /// A transfer task is (or was, before a crash) working on the job.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Downloading | JobStatus::Uploading)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Pending, Cancelled)
                | (Downloading, Uploading)
                | (Downloading, Failed)
                | (Uploading, Completed)
                | (Uploading, Failed)
        )
    }

    /// Verb phrase for rejection messages ("cannot <action>").
    pub fn transition_action(next: JobStatus) -> &'static str {
        match next {
            JobStatus::Pending => "return to pending",
            JobStatus::Downloading => "start downloading",
            JobStatus::Uploading => "start uploading",
            JobStatus::Completed => "complete",
            JobStatus::Failed => "fail",
            JobStatus::Cancelled => "cancel",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    Downloading,
    Uploading,
}

/// Latest progress snapshot; overwritten frequently while a job is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobProgress {
    pub phase: Option<TransferPhase>,
    /// Destination being uploaded to (uploading phase only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Provider>,
    pub bytes_done: u64,
    pub bytes_total: Option<u64>,
    /// Bytes per second.
    pub speed_bps: f64,
    pub eta_secs: Option<f64>,
    pub message: String,
}

impl JobProgress {
    /// Progress carrying only a message (phase changes, final states).
    pub fn note(phase: Option<TransferPhase>, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Fraction complete in [0.0, 1.0], if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.bytes_total?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes_done as f64 / total as f64).min(1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationOutcome {
    Skipped,
    Succeeded,
    Failed,
}

/// Outcome of one destination's upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationResult {
    pub outcome: DestinationOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Skip reason or other note for the UI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Presigned or public URL of the uploaded object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

impl DestinationResult {
    pub fn succeeded(share_url: Option<String>) -> Self {
        Self {
            outcome: DestinationOutcome::Succeeded,
            error_message: None,
            detail: None,
            share_url,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            outcome: DestinationOutcome::Skipped,
            error_message: None,
            detail: Some(reason.into()),
            share_url: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            outcome: DestinationOutcome::Failed,
            error_message: Some(error.into()),
            detail: None,
            share_url: None,
        }
    }
}

/// Fields supplied when a job is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub source_url: String,
    pub target_filename: String,
    pub destinations: Vec<Provider>,
}

/// Full job record.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub source_url: String,
    pub target_filename: String,
    pub destinations: Vec<Provider>,
    pub status: JobStatus,
    pub progress: JobProgress,
    pub results: BTreeMap<Provider, DestinationResult>,
    /// Captured job-level error (download failure, aggregated upload failures, interruption).
    pub error_message: Option<String>,
    /// Background unit working on the job; only set while active.
    pub worker_handle: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Job {
    pub fn result(&self, provider: Provider) -> Option<&DestinationResult> {
        self.results.get(&provider)
    }

    /// Selected destinations that have no recorded result yet.
    pub fn unattempted_destinations(&self) -> Vec<Provider> {
        self.destinations
            .iter()
            .copied()
            .filter(|p| !self.results.contains_key(p))
            .collect()
    }
}
