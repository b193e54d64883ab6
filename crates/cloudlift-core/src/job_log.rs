//! Per-job output and error logs under `<state>/logs/`.
//!
//! Each job gets `<id>.out.log` (every step of its transfer) and
//! `<id>.err.log` (errors only). Both are append-only. A failure to write a
//! log line is reported through `tracing` and never fails the transfer.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::job_store::JobId;

/// The `logs/` directory of a state dir.
#[derive(Debug, Clone)]
pub struct JobLogs {
    dir: PathBuf,
}

impl JobLogs {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<state_dir>/logs`.
    pub fn in_state_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join("logs"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output_path(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{}.out.log", id))
    }

    pub fn error_path(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{}.err.log", id))
    }

    /// Writer for one job's logs. Files are created on first write.
    pub fn open(&self, id: JobId) -> JobLog {
        JobLog {
            id,
            out: self.output_path(id),
            err: self.error_path(id),
        }
    }

    /// Full output log; empty if the job never wrote one.
    pub fn read_output(&self, id: JobId) -> io::Result<String> {
        read_or_empty(&self.output_path(id))
    }

    /// Full error log; empty if the job never wrote one.
    pub fn read_errors(&self, id: JobId) -> io::Result<String> {
        read_or_empty(&self.error_path(id))
    }

    /// Delete both log files of a job. Missing files are not an error.
    pub fn remove(&self, id: JobId) -> io::Result<()> {
        for path in [self.output_path(id), self.error_path(id)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Append-only writer for one job.
#[derive(Debug, Clone)]
pub struct JobLog {
    id: JobId,
    out: PathBuf,
    err: PathBuf,
}

impl JobLog {
    pub fn info(&self, message: impl AsRef<str>) {
        let line = format_line(message.as_ref());
        if let Err(e) = append(&self.out, &line) {
            tracing::warn!(job_id = self.id, error = %e, "failed to write job output log");
        }
    }

    /// Errors go to both files so the output log reads as a complete timeline.
    pub fn error(&self, message: impl AsRef<str>) {
        let line = format_line(&format!("ERROR {}", message.as_ref()));
        for path in [&self.out, &self.err] {
            if let Err(e) = append(path, &line) {
                tracing::warn!(job_id = self.id, error = %e, "failed to write job error log");
            }
        }
    }
}

fn format_line(message: &str) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("[{}.{:03}] {}\n", ts.as_secs(), ts.subsec_millis(), message)
}

fn append(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

fn read_or_empty(path: &Path) -> io::Result<String> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}
