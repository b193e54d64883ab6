//! Integration test: CurlDownloader against a local HTTP server.

mod common;

use std::sync::{Arc, Mutex};

use cloudlift_core::transfer::{CurlDownloader, Downloader, ProgressFn};
use tempfile::tempdir;

fn recording_progress() -> (ProgressFn, Arc<Mutex<Vec<(u64, Option<u64>)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cb: ProgressFn = Arc::new(move |done, total| sink.lock().unwrap().push((done, total)));
    (cb, seen)
}

#[tokio::test]
async fn download_writes_body_and_reports_progress() {
    let body: Vec<u8> = (0u8..251).cycle().take(300 * 1024).collect();
    let base = common::http_server::start(body.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    let (cb, seen) = recording_progress();
    let n = CurlDownloader::default()
        .download(&format!("{}/file.bin", base), &dest, cb)
        .await
        .expect("download");

    assert_eq!(n, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.last(), Some(&(body.len() as u64, Some(body.len() as u64))));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn download_follows_redirects() {
    let body = b"redirected body".to_vec();
    let base = common::http_server::start(body.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("out.bin");

    let (cb, _) = recording_progress();
    let n = CurlDownloader::default()
        .download(&format!("{}/redirect", base), &dest, cb)
        .await
        .expect("download");
    assert_eq!(n, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[tokio::test]
async fn http_error_is_a_download_error() {
    let base = common::http_server::start(b"x".to_vec());
    let dir = tempdir().unwrap();

    let (cb, _) = recording_progress();
    let err = CurlDownloader::default()
        .download(&format!("{}/missing", base), &dir.path().join("m.bin"), cb)
        .await
        .unwrap_err();
    assert!(err.reason.contains("404"), "{}", err);
}

#[tokio::test]
async fn empty_body_returns_zero_bytes() {
    let base = common::http_server::start(b"x".to_vec());
    let dir = tempdir().unwrap();

    // the executor turns this into a failure; the transport itself just reports 0
    let (cb, _) = recording_progress();
    let n = CurlDownloader::default()
        .download(&format!("{}/empty", base), &dir.path().join("e.bin"), cb)
        .await
        .unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn connection_refused_is_a_download_error() {
    let dir = tempdir().unwrap();
    let (cb, _) = recording_progress();
    let err = CurlDownloader::default()
        .download("http://127.0.0.1:1/nothing", &dir.path().join("x.bin"), cb)
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("download failed:"));
}
