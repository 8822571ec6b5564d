// crates/appcontent-pipeline/tests/http/download_tests.rs
// ============================================================================
// Module: HTTP Downloader Tests
// Description: Installer downloads against a mock file server.
// Purpose: Validate naming, scheme policy, status handling, and size caps.
// Dependencies: appcontent-core, appcontent-pipeline, tempfile, tiny_http
// ============================================================================

//! ## Overview
//! Exercises [`appcontent_pipeline::HttpDownloader`]. The mock server speaks
//! plain http, so most tests opt into `allow_http`.

use std::fs;
use std::time::Duration;

use appcontent_core::Deadline;
use appcontent_pipeline::DownloadError;
use appcontent_pipeline::Downloader;
use appcontent_pipeline::HttpDownloader;
use appcontent_pipeline::HttpDownloaderSettings;

use super::common::serve;

fn downloader(max_bytes: u64) -> HttpDownloader {
    HttpDownloader::new(HttpDownloaderSettings {
        max_bytes,
        allow_http: true,
        max_redirects: 2,
    })
    .unwrap()
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(30))
}

/// Tests the body lands under the URL's final path segment.
#[test]
fn downloads_to_final_path_segment() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = serve(vec![(200, "installer-bytes".to_string())]);

    let path = downloader(1024)
        .download(&format!("{base}/files/Setup%20Tool.msi?token=abc"), dir.path(), &deadline())
        .unwrap();
    let requests = handle.join().unwrap();

    assert_eq!(requests[0].method, "GET");
    assert_eq!(path.parent().unwrap(), dir.path());
    assert_eq!(path.file_name().unwrap(), "Setup_20Tool.msi");
    assert_eq!(fs::read_to_string(&path).unwrap(), "installer-bytes");
}

/// Tests plain http is refused unless explicitly allowed.
#[test]
fn plain_http_is_refused_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let downloader = HttpDownloader::new(HttpDownloaderSettings::default()).unwrap();
    let err = downloader
        .download("http://127.0.0.1:9/setup.msi", dir.path(), &deadline())
        .unwrap_err();
    assert!(matches!(err, DownloadError::UnsupportedScheme(scheme) if scheme == "http"));
}

/// Tests non-http schemes are refused.
#[test]
fn file_scheme_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let err = downloader(1024).download("file:///etc/passwd", dir.path(), &deadline()).unwrap_err();
    assert!(matches!(err, DownloadError::UnsupportedScheme(_)));
}

/// Tests a missing installer fails with its status and writes nothing.
#[test]
fn not_found_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = serve(vec![(404, String::new())]);
    let err =
        downloader(1024).download(&format!("{base}/setup.msi"), dir.path(), &deadline()).unwrap_err();
    handle.join().unwrap();

    assert!(matches!(err, DownloadError::Status(404)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Tests bodies over the cap are rejected and the partial file removed.
#[test]
fn oversized_body_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = serve(vec![(200, "0123456789".to_string())]);
    let err =
        downloader(4).download(&format!("{base}/setup.msi"), dir.path(), &deadline()).unwrap_err();
    handle.join().unwrap();

    assert!(matches!(
        err,
        DownloadError::TooLarge {
            max_bytes: 4
        }
    ));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Tests an exhausted deadline skips the request.
#[test]
fn exhausted_deadline_skips_download() {
    let dir = tempfile::tempdir().unwrap();
    let err = downloader(1024)
        .download("http://127.0.0.1:9/setup.msi", dir.path(), &Deadline::after(Duration::ZERO))
        .unwrap_err();
    assert!(matches!(err, DownloadError::DeadlineExhausted));
}
