//! Persistent job store (SQLite via sqlx).
//!
//! Holds every job record: source URL, target filename, selected destinations,
//! status, latest progress snapshot and per-destination results. Survives
//! process restarts; the scheduler reconciles jobs that were left active.

pub mod types;
pub mod db;
mod jobs;

pub use types::*;
pub use db::JobStore;
