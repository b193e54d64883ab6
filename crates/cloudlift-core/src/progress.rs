//! Progress reporting for transfers (bytes done, speed, ETA).
//!
//! Transfer callbacks fire on every chunk; the reporter turns those into at
//! most one [`JobProgress`] snapshot per interval so the job store is not
//! written on every chunk. Speed is measured over the window since the last
//! emitted snapshot.

use std::time::{Duration, Instant};

use crate::destinations::Provider;
use crate::job_store::{JobProgress, TransferPhase};

const MIB: f64 = 1_048_576.0;

#[derive(Debug, Clone)]
pub struct ProgressReporter {
    phase: TransferPhase,
    destination: Option<Provider>,
    interval: Duration,
    total: Option<u64>,
    started: Instant,
    last_emit: Option<Instant>,
    last_emit_bytes: u64,
    speed_bps: f64,
}

impl ProgressReporter {
    pub fn new(phase: TransferPhase, destination: Option<Provider>, interval: Duration) -> Self {
        Self::new_at(phase, destination, interval, Instant::now())
    }

    pub fn new_at(
        phase: TransferPhase,
        destination: Option<Provider>,
        interval: Duration,
        started: Instant,
    ) -> Self {
        Self {
            phase,
            destination,
            interval,
            total: None,
            started,
            last_emit: None,
            last_emit_bytes: 0,
            speed_bps: 0.0,
        }
    }

    /// Total size once known (e.g. from Content-Length or the staged file).
    pub fn set_total(&mut self, total: Option<u64>) {
        if total.is_some() {
            self.total = total;
        }
    }

    /// Record cumulative `bytes_done`. Returns a snapshot when the throttle interval has elapsed.
    pub fn observe(&mut self, bytes_done: u64, total: Option<u64>) -> Option<JobProgress> {
        self.observe_at(bytes_done, total, Instant::now())
    }

    pub fn observe_at(
        &mut self,
        bytes_done: u64,
        total: Option<u64>,
        now: Instant,
    ) -> Option<JobProgress> {
        self.set_total(total);
        if let Some(last) = self.last_emit {
            if now.saturating_duration_since(last) < self.interval {
                return None;
            }
        }
        let window_start = self.last_emit.unwrap_or(self.started);
        let window = now.saturating_duration_since(window_start).as_secs_f64();
        if window > 0.0 {
            self.speed_bps = bytes_done.saturating_sub(self.last_emit_bytes) as f64 / window;
        }
        self.last_emit = Some(now);
        self.last_emit_bytes = bytes_done;
        Some(self.snapshot(bytes_done))
    }

    /// Final snapshot, emitted regardless of the throttle. Speed is the whole-transfer average.
    pub fn finish(&mut self, bytes_done: u64) -> JobProgress {
        self.finish_at(bytes_done, Instant::now())
    }

    pub fn finish_at(&mut self, bytes_done: u64, now: Instant) -> JobProgress {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed > 0.0 {
            self.speed_bps = bytes_done as f64 / elapsed;
        }
        self.total = Some(self.total.unwrap_or(bytes_done).max(bytes_done));
        self.last_emit = Some(now);
        self.last_emit_bytes = bytes_done;
        self.snapshot(bytes_done)
    }

    fn snapshot(&self, bytes_done: u64) -> JobProgress {
        JobProgress {
            phase: Some(self.phase),
            destination: self.destination,
            bytes_done,
            bytes_total: self.total,
            speed_bps: self.speed_bps,
            eta_secs: eta_secs(bytes_done, self.total, self.speed_bps),
            message: format_message(bytes_done, self.total, self.speed_bps),
        }
    }
}

/// Estimated seconds remaining (None if total unknown or rate is 0).
pub fn eta_secs(bytes_done: u64, total: Option<u64>, speed_bps: f64) -> Option<f64> {
    let remaining = total?.saturating_sub(bytes_done);
    if remaining == 0 {
        return Some(0.0);
    }
    if speed_bps <= 0.0 {
        return None;
    }
    Some(remaining as f64 / speed_bps)
}

/// `"12.00 MiB / 100.00 MiB (1.50 MiB/s)"`, or without the total when unknown.
pub fn format_message(bytes_done: u64, total: Option<u64>, speed_bps: f64) -> String {
    let done = bytes_done as f64 / MIB;
    let speed = speed_bps / MIB;
    match total {
        Some(t) => format!("{:.2} MiB / {:.2} MiB ({:.2} MiB/s)", done, t as f64 / MIB, speed),
        None => format!("{:.2} MiB ({:.2} MiB/s)", done, speed),
    }
}
