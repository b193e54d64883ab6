//! Download capability and the libcurl-backed implementation.
//!
//! The body is streamed sequentially into the staged file. libcurl runs in
//! `spawn_blocking` so the runtime threads never wait on network I/O.

use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::str;
use std::time::Duration;
use thiserror::Error;

use super::ProgressFn;

/// Network, HTTP status, or local write failure while fetching the source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("download failed: {reason}")]
pub struct DownloadError {
    pub reason: String,
}

impl DownloadError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Fetches a URL into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download `url` to `dest`, overwriting it. Calls `on_progress(bytes_done,
    /// bytes_total_if_known)` as data arrives. Returns the number of bytes written.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressFn,
    ) -> Result<u64, DownloadError>;
}

/// Single-stream HTTP GET via libcurl.
#[derive(Debug, Clone)]
pub struct CurlDownloader {
    pub connect_timeout: Duration,
    /// Abort when the rate stays below 1 KiB/s for this long.
    pub low_speed_time: Duration,
    pub max_redirections: u32,
}

impl Default for CurlDownloader {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            low_speed_time: Duration::from_secs(60),
            max_redirections: 10,
        }
    }
}

#[async_trait]
impl Downloader for CurlDownloader {
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        on_progress: ProgressFn,
    ) -> Result<u64, DownloadError> {
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let opts = self.clone();
        tokio::task::spawn_blocking(move || download_blocking(&opts, &url, &dest, on_progress))
            .await
            .map_err(|e| DownloadError::new(format!("download task: {}", e)))?
    }
}

fn curl_err(e: curl::Error) -> DownloadError {
    DownloadError::new(format!("curl: {}", e))
}

fn download_blocking(
    opts: &CurlDownloader,
    url: &str,
    dest: &Path,
    on_progress: ProgressFn,
) -> Result<u64, DownloadError> {
    let mut file = File::create(dest)
        .map_err(|e| DownloadError::new(format!("create {}: {}", dest.display(), e)))?;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(opts.max_redirections).map_err(curl_err)?;
    easy.connect_timeout(opts.connect_timeout).map_err(curl_err)?;
    easy.low_speed_limit(1024).map_err(curl_err)?;
    easy.low_speed_time(opts.low_speed_time).map_err(curl_err)?;
    easy.useragent(concat!("cloudlift/", env!("CARGO_PKG_VERSION")))
        .map_err(curl_err)?;
    // Fail on 4xx/5xx before writing the error page into the staged file.
    easy.fail_on_error(true).map_err(curl_err)?;

    let written = Cell::new(0u64);
    // Reset on every status line so a redirect's Content-Length is not kept.
    let content_length: Cell<Option<u64>> = Cell::new(None);
    let write_error: RefCell<Option<io::Error>> = RefCell::new(None);

    let perform = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    let line = line.trim();
                    if line.starts_with("HTTP/") {
                        content_length.set(None);
                    } else if let Some((name, value)) = line.split_once(':') {
                        if name.trim().eq_ignore_ascii_case("content-length") {
                            content_length.set(value.trim().parse().ok());
                        }
                    }
                }
                true
            })
            .map_err(curl_err)?;
        transfer
            .write_function(|data| match file.write_all(data) {
                Ok(()) => {
                    let done = written.get() + data.len() as u64;
                    written.set(done);
                    on_progress(done, content_length.get());
                    Ok(data.len())
                }
                Err(e) => {
                    *write_error.borrow_mut() = Some(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(curl_err)?;
        transfer.perform()
    };

    if let Some(e) = write_error.into_inner() {
        return Err(DownloadError::new(format!(
            "write {}: {}",
            dest.display(),
            e
        )));
    }
    if let Err(e) = perform {
        if e.is_http_returned_error() {
            let code = easy.response_code().unwrap_or(0);
            return Err(DownloadError::new(format!("GET {} returned HTTP {}", url, code)));
        }
        return Err(curl_err(e));
    }

    let code = easy.response_code().map_err(curl_err)?;
    if !(200..300).contains(&code) {
        return Err(DownloadError::new(format!("GET {} returned HTTP {}", url, code)));
    }

    file.flush()
        .and_then(|()| file.sync_all())
        .map_err(|e| DownloadError::new(format!("flush {}: {}", dest.display(), e)))?;

    let written = written.get();
    if let Some(expected) = content_length.get() {
        if written != expected {
            return Err(DownloadError::new(format!(
                "partial transfer: wrote {} of {} bytes",
                written, expected
            )));
        }
    }
    Ok(written)
}
