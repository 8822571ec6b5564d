// crates/appcontent-pipeline/src/source/http.rs
// ============================================================================
// Module: HTTP Installer Downloader
// Description: Streams a remote installer to a local file.
// Purpose: Fetch URL installer sources with scheme, redirect, and size limits.
// Dependencies: reqwest, url
// ============================================================================

//! ## Overview
//! [`HttpDownloader`] streams `https://` (and optionally `http://`) URLs to
//! disk without buffering the whole installer. Non-success status codes fail
//! closed, redirects are limited and never downgrade to plain http unless
//! allowed, and bodies larger than the configured cap are rejected and
//! removed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use appcontent_core::Deadline;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use url::Url;

use crate::source::DownloadError;
use crate::source::Downloader;
use crate::source::installer_file_name;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Limits applied to installer downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpDownloaderSettings {
    /// Maximum installer size in bytes.
    pub max_bytes: u64,
    /// Permit plain `http` URLs (including redirect targets).
    pub allow_http: bool,
    /// Maximum redirects followed.
    pub max_redirects: u8,
}

impl Default for HttpDownloaderSettings {
    fn default() -> Self {
        Self {
            max_bytes: 8 * 1024 * 1024 * 1024,
            allow_http: false,
            max_redirects: 5,
        }
    }
}

// ============================================================================
// SECTION: HTTP Downloader
// ============================================================================

/// HTTP-backed installer downloader.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    /// HTTP client used for downloads.
    client: Client,
    /// Download limits.
    settings: HttpDownloaderSettings,
}

impl HttpDownloader {
    /// Builds a downloader with a client configured from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the HTTP client cannot be constructed.
    pub fn new(settings: HttpDownloaderSettings) -> Result<Self, DownloadError> {
        let max_redirects = usize::from(settings.max_redirects);
        let allow_http = settings.allow_http;
        let policy = Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error("too many redirects")
            } else if attempt.url().scheme() == "http" && !allow_http {
                attempt.error("redirect to plain http refused")
            } else {
                attempt.follow()
            }
        });
        let client = Client::builder()
            .redirect(policy)
            .build()
            .map_err(|err| DownloadError::Http(err.to_string()))?;
        Ok(Self {
            client,
            settings,
        })
    }

    /// Creates a downloader with a preconfigured client.
    #[must_use]
    pub const fn with_client(client: Client, settings: HttpDownloaderSettings) -> Self {
        Self {
            client,
            settings,
        }
    }

    /// Validates the URL scheme against the settings.
    fn parse_url(&self, raw: &str) -> Result<Url, DownloadError> {
        let url = Url::parse(raw).map_err(|err| DownloadError::InvalidUrl(err.to_string()))?;
        match url.scheme() {
            "https" => Ok(url),
            "http" if self.settings.allow_http => Ok(url),
            scheme => Err(DownloadError::UnsupportedScheme(scheme.to_string())),
        }
    }
}

impl Downloader for HttpDownloader {
    fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        deadline: &Deadline,
    ) -> Result<PathBuf, DownloadError> {
        let url = self.parse_url(url)?;
        let remaining = deadline.remaining();
        if remaining.is_zero() {
            return Err(DownloadError::DeadlineExhausted);
        }
        let response = self
            .client
            .get(url.as_str())
            .timeout(remaining)
            .send()
            .map_err(|err| {
                if err.is_timeout() && deadline.is_exhausted() {
                    DownloadError::DeadlineExhausted
                } else {
                    DownloadError::Http(err.without_url().to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status().as_u16()));
        }
        let max_bytes = self.settings.max_bytes;
        if response.content_length().is_some_and(|length| length > max_bytes) {
            return Err(DownloadError::TooLarge {
                max_bytes,
            });
        }
        let path = dest_dir.join(installer_file_name(&url));
        let mut file = File::create(&path).map_err(|err| DownloadError::Io(err.to_string()))?;
        let mut limited = response.take(max_bytes.saturating_add(1));
        let written = match io::copy(&mut limited, &mut file) {
            Ok(written) => written,
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(DownloadError::Http(err.to_string()));
            }
        };
        if written > max_bytes {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(DownloadError::TooLarge {
                max_bytes,
            });
        }
        file.sync_all().map_err(|err| DownloadError::Io(err.to_string()))?;
        Ok(path)
    }
}
