//! Tests for status, cancel, clear, logs, destinations and status rendering.

use super::parse;
use crate::cli::commands::{destination_summary, progress_column};
use crate::cli::CliCommand;
use cloudlift_core::destinations::Provider;
use cloudlift_core::job_store::{
    DestinationResult, Job, JobProgress, JobStatus, TransferPhase,
};
use std::collections::BTreeMap;

#[test]
fn cli_parse_status() {
    match parse(&["cloudlift", "status"]) {
        CliCommand::Status { id } => assert!(id.is_none()),
        _ => panic!("expected Status"),
    }
    match parse(&["cloudlift", "status", "7"]) {
        CliCommand::Status { id } => assert_eq!(id, Some(7)),
        _ => panic!("expected Status with id"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["cloudlift", "cancel", "42"]) {
        CliCommand::Cancel { id } => assert_eq!(id, 42),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_clear() {
    assert!(matches!(parse(&["cloudlift", "clear"]), CliCommand::Clear));
}

#[test]
fn cli_parse_logs() {
    match parse(&["cloudlift", "logs", "3"]) {
        CliCommand::Logs { id, errors } => {
            assert_eq!(id, 3);
            assert!(!errors);
        }
        _ => panic!("expected Logs"),
    }
    match parse(&["cloudlift", "logs", "3", "--errors"]) {
        CliCommand::Logs { errors, .. } => assert!(errors),
        _ => panic!("expected Logs with --errors"),
    }
}

#[test]
fn cli_parse_destinations() {
    assert!(matches!(
        parse(&["cloudlift", "destinations"]),
        CliCommand::Destinations
    ));
}

fn job(status: JobStatus) -> Job {
    Job {
        id: 1,
        source_url: "https://example.com/a.bin".into(),
        target_filename: "a.bin".into(),
        destinations: vec![Provider::R2, Provider::Wasabi, Provider::Oracle],
        status,
        progress: JobProgress::default(),
        results: BTreeMap::new(),
        error_message: None,
        worker_handle: None,
        created_at: 0,
        updated_at: 0,
    }
}

#[test]
fn progress_column_shows_percent_and_destination_while_uploading() {
    let mut j = job(JobStatus::Uploading);
    j.progress = JobProgress {
        phase: Some(TransferPhase::Uploading),
        destination: Some(Provider::Wasabi),
        bytes_done: 25,
        bytes_total: Some(100),
        message: "msg".into(),
        ..JobProgress::default()
    };
    assert_eq!(progress_column(&j), "[wasabi]  25% msg");
}

#[test]
fn progress_column_for_idle_jobs() {
    assert_eq!(progress_column(&job(JobStatus::Pending)), "queued");
    assert_eq!(progress_column(&job(JobStatus::Failed)), "-");
}

#[test]
fn destination_summary_lists_every_selected_destination() {
    let mut j = job(JobStatus::Completed);
    j.results.insert(Provider::R2, DestinationResult::skipped("too big"));
    j.results.insert(Provider::Wasabi, DestinationResult::succeeded(None));
    assert_eq!(destination_summary(&j), "r2:skipped wasabi:ok oracle:-");
}
