//! Final status of a job once its transfer task has ended.

use crate::job_store::{DestinationOutcome, DestinationResult, Job, JobProgress, JobStatus};

/// Error recorded on jobs found active when the engine starts.
pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

/// Result recorded for destinations the transfer never reached.
pub const NOT_ATTEMPTED: &str = "not attempted";

/// Settle an active job from its recorded results.
///
/// - `crash`: the transfer task panicked or hit a store error. Every
///   destination without a result is marked failed with the same message.
/// - Still `downloading`: the download failed; its error is already recorded.
/// - `uploading`: completed if at least one destination succeeded, else failed
///   with the per-destination errors aggregated.
///
/// Jobs that are not active are left untouched.
pub fn settle(job: &mut Job, crash: Option<&str>) {
    if !job.status.is_active() {
        return;
    }

    if let Some(message) = crash {
        for provider in job.unattempted_destinations() {
            job.results
                .insert(provider, DestinationResult::failed(message));
        }
        fail(job, message.to_string());
        return;
    }

    if job.status == JobStatus::Downloading {
        let message = job
            .error_message
            .clone()
            .unwrap_or_else(|| "transfer ended before the upload phase".to_string());
        fail(job, message);
        return;
    }

    for provider in job.unattempted_destinations() {
        job.results
            .insert(provider, DestinationResult::failed(NOT_ATTEMPTED));
    }
    let succeeded = count(job, DestinationOutcome::Succeeded);
    if succeeded > 0 {
        let message = format!(
            "completed: uploaded to {} of {} destinations",
            succeeded,
            job.destinations.len()
        );
        job.status = JobStatus::Completed;
        job.progress = JobProgress {
            message,
            ..job.progress.clone()
        };
        job.worker_handle = None;
    } else {
        let message = aggregate_errors(job);
        fail(job, message);
    }
}

/// Mark a job left active by a dead process as failed.
pub fn interrupt(job: &mut Job) {
    if job.status.is_active() {
        fail(job, INTERRUPTED_BY_RESTART.to_string());
    }
}

fn fail(job: &mut Job, message: String) {
    job.status = JobStatus::Failed;
    job.progress = JobProgress::note(job.progress.phase, &message);
    job.error_message = Some(message);
    job.worker_handle = None;
}

fn count(job: &Job, outcome: DestinationOutcome) -> usize {
    job.results.values().filter(|r| r.outcome == outcome).count()
}

/// `"no destination succeeded: Cloudflare R2 skipped (...); Wasabi failed (...)"`.
fn aggregate_errors(job: &Job) -> String {
    let details: Vec<String> = job
        .destinations
        .iter()
        .filter_map(|p| job.result(*p).map(|r| (p, r)))
        .map(|(p, r)| {
            let (verb, detail) = match r.outcome {
                DestinationOutcome::Skipped => ("skipped", r.detail.as_deref()),
                DestinationOutcome::Failed => ("failed", r.error_message.as_deref()),
                DestinationOutcome::Succeeded => ("succeeded", None),
            };
            match detail {
                Some(d) => format!("{} {} ({})", p.display_name(), verb, d),
                None => format!("{} {}", p.display_name(), verb),
            }
        })
        .collect();
    format!("no destination succeeded: {}", details.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destinations::Provider;
    use std::collections::BTreeMap;

    fn job(status: JobStatus, destinations: &[Provider]) -> Job {
        Job {
            id: 1,
            source_url: "https://example.com/a.bin".into(),
            target_filename: "a.bin".into(),
            destinations: destinations.to_vec(),
            status,
            progress: JobProgress::default(),
            results: BTreeMap::new(),
            error_message: None,
            worker_handle: Some("pid:1/worker:1".into()),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn partial_failure_completes() {
        let mut j = job(JobStatus::Uploading, &[Provider::R2, Provider::Wasabi]);
        j.results.insert(Provider::R2, DestinationResult::succeeded(None));
        j.results.insert(Provider::Wasabi, DestinationResult::failed("403"));
        settle(&mut j, None);
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.results[&Provider::Wasabi].outcome, DestinationOutcome::Failed);
        assert!(j.worker_handle.is_none());
        assert!(j.error_message.is_none());
    }

    #[test]
    fn skip_plus_success_completes() {
        let mut j = job(JobStatus::Uploading, &[Provider::R2, Provider::Oracle]);
        j.results.insert(Provider::R2, DestinationResult::skipped("too big"));
        j.results.insert(Provider::Oracle, DestinationResult::succeeded(None));
        settle(&mut j, None);
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.progress.message, "completed: uploaded to 1 of 2 destinations");
    }

    #[test]
    fn no_success_fails_with_aggregated_message() {
        let mut j = job(JobStatus::Uploading, &[Provider::R2, Provider::Wasabi]);
        j.results.insert(Provider::R2, DestinationResult::skipped("too big"));
        j.results.insert(Provider::Wasabi, DestinationResult::failed("timeout"));
        settle(&mut j, None);
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(
            j.error_message.as_deref(),
            Some("no destination succeeded: Cloudflare R2 skipped (too big); Wasabi failed (timeout)")
        );
    }

    #[test]
    fn all_skipped_fails() {
        let mut j = job(JobStatus::Uploading, &[Provider::R2]);
        j.results.insert(Provider::R2, DestinationResult::skipped("too big"));
        settle(&mut j, None);
        assert_eq!(j.status, JobStatus::Failed);
    }

    #[test]
    fn download_failure_keeps_recorded_error() {
        let mut j = job(JobStatus::Downloading, &[Provider::Wasabi]);
        j.error_message = Some("download failed: HTTP 404".into());
        settle(&mut j, None);
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.error_message.as_deref(), Some("download failed: HTTP 404"));
        assert!(j.results.is_empty());
    }

    #[test]
    fn crash_fails_and_fills_missing_results() {
        let mut j = job(JobStatus::Uploading, &[Provider::R2, Provider::Wasabi]);
        j.results.insert(Provider::R2, DestinationResult::succeeded(None));
        settle(&mut j, Some("transfer worker crashed: boom"));
        assert_eq!(j.status, JobStatus::Failed);
        assert_eq!(j.results[&Provider::R2].outcome, DestinationOutcome::Succeeded);
        assert_eq!(
            j.results[&Provider::Wasabi].error_message.as_deref(),
            Some("transfer worker crashed: boom")
        );
    }

    #[test]
    fn unattempted_destinations_are_failed() {
        let mut j = job(JobStatus::Uploading, &[Provider::R2, Provider::Wasabi]);
        j.results.insert(Provider::R2, DestinationResult::succeeded(None));
        settle(&mut j, None);
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(
            j.results[&Provider::Wasabi].error_message.as_deref(),
            Some(NOT_ATTEMPTED)
        );
    }

    #[test]
    fn interrupt_only_touches_active_jobs() {
        let mut active = job(JobStatus::Downloading, &[Provider::R2]);
        interrupt(&mut active);
        assert_eq!(active.status, JobStatus::Failed);
        assert_eq!(active.error_message.as_deref(), Some(INTERRUPTED_BY_RESTART));

        let mut pending = job(JobStatus::Pending, &[Provider::R2]);
        interrupt(&mut pending);
        assert_eq!(pending.status, JobStatus::Pending);
        settle(&mut pending, None);
        assert_eq!(pending.status, JobStatus::Pending);
    }
}
