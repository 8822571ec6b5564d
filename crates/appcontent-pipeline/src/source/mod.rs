// crates/appcontent-pipeline/src/source/mod.rs
// ============================================================================
// Module: Installer Source Resolution
// Description: Turns a caller's file path or URL into a local installer file.
// Purpose: Give the pipeline one local path plus a scoped cleanup handle.
// Dependencies: appcontent-core, tempfile, thiserror, url
// ============================================================================

//! ## Overview
//! [`SourceResolver`] inspects a [`SourceSpec`] and either reports that there
//! is nothing to upload yet, returns the caller's local path unchanged, or
//! downloads the URL into a fresh `appcontent-*` temporary directory.
//!
//! The returned [`InstallerSource`] owns any temporary directory it created.
//! [`InstallerSource::release`] removes it exactly once; dropping an
//! unreleased source removes it as a fallback. Caller-owned files are never
//! deleted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use appcontent_core::Deadline;
use appcontent_core::Exhaustion;
use tempfile::TempDir;
use thiserror::Error;
use url::Url;

use crate::error::UploadError;
use crate::error::UploadPhase;

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod http;

pub use http::HttpDownloader;
pub use http::HttpDownloaderSettings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for per-invocation download directories.
pub const TEMP_DIR_PREFIX: &str = "appcontent-";
/// File name used when a URL has no usable final path segment.
pub const FALLBACK_FILE_NAME: &str = "installer.pkg";
/// Longest file name kept from a URL.
const MAX_FILE_NAME_LENGTH: usize = 200;

// ============================================================================
// SECTION: Source Values
// ============================================================================

/// Tri-state configuration value for an installer source field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SourceValue {
    /// The value is not yet known (for example, computed later in a plan).
    Unknown,
    /// The value is explicitly absent.
    #[default]
    Null,
    /// The value is known; it may still be empty.
    Known(String),
}

impl SourceValue {
    /// Creates a known value.
    #[must_use]
    pub fn known(value: impl Into<String>) -> Self {
        Self::Known(value.into())
    }

    /// Returns true for [`SourceValue::Unknown`].
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns the value when known and not blank.
    #[must_use]
    pub fn non_empty(&self) -> Option<&str> {
        match self {
            Self::Known(value) if !value.trim().is_empty() => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<Option<String>> for SourceValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }
}

/// Where the installer bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceSpec {
    /// Local installer path.
    pub file_path: SourceValue,
    /// Installer download URL.
    pub url: SourceValue,
}

impl SourceSpec {
    /// Creates a spec for a local file.
    #[must_use]
    pub fn from_file(path: impl Into<String>) -> Self {
        Self {
            file_path: SourceValue::known(path),
            url: SourceValue::Null,
        }
    }

    /// Creates a spec for a URL download.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            file_path: SourceValue::Null,
            url: SourceValue::known(url),
        }
    }

    /// Creates a spec whose inputs are not yet known.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            file_path: SourceValue::Unknown,
            url: SourceValue::Unknown,
        }
    }
}

// ============================================================================
// SECTION: Installer Source
// ============================================================================

/// Local installer file owned by one pipeline invocation.
///
/// # Invariants
/// - Only downloaded sources own a temporary directory.
/// - The temporary directory is removed at most once.
#[derive(Debug)]
pub struct InstallerSource {
    /// Installer path.
    path: PathBuf,
    /// Temporary directory holding a downloaded installer.
    temp_dir: Option<TempDir>,
    /// Whether the source was downloaded.
    temporary: bool,
}

impl InstallerSource {
    /// Wraps a caller-owned local file.
    #[must_use]
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp_dir: None,
            temporary: false,
        }
    }

    /// Wraps a downloaded file inside `temp_dir`.
    #[must_use]
    pub fn downloaded(path: PathBuf, temp_dir: TempDir) -> Self {
        Self {
            path,
            temp_dir: Some(temp_dir),
            temporary: true,
        }
    }

    /// Returns the installer path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true for downloaded (temporary) sources.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Returns the installer file name presented to the backend.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path.file_name().map_or_else(
            || FALLBACK_FILE_NAME.to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// Removes the temporary directory, if any.
    ///
    /// Returns `Ok(true)` when something was removed and `Ok(false)` when
    /// there was nothing to remove (local source or already released).
    ///
    /// # Errors
    ///
    /// Returns an error when the directory exists but cannot be removed.
    pub fn release(&mut self) -> io::Result<bool> {
        let Some(dir) = self.temp_dir.take() else {
            return Ok(false);
        };
        match dir.close() {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }
}

// ============================================================================
// SECTION: Downloader
// ============================================================================

/// Errors returned by [`Downloader`] implementations.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// The URL scheme is not allowed.
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    /// Network failure.
    #[error("http error: {0}")]
    Http(String),
    /// The server answered with a non-success status.
    #[error("http status {0}")]
    Status(u16),
    /// The installer exceeds the configured size cap.
    #[error("installer exceeds size limit of {max_bytes} bytes")]
    TooLarge {
        /// Configured cap.
        max_bytes: u64,
    },
    /// Local filesystem failure.
    #[error("download io error: {0}")]
    Io(String),
    /// No budget remained to download.
    #[error("download skipped: deadline exhausted")]
    DeadlineExhausted,
}

/// Fetches a remote installer into a directory.
pub trait Downloader: Send + Sync {
    /// Downloads `url` into `dest_dir` and returns the written file path.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the download fails; partial files are removed.
    fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        deadline: &Deadline,
    ) -> Result<PathBuf, DownloadError>;
}

/// Derives a safe local file name from a URL's final path segment.
#[must_use]
pub fn installer_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
        .unwrap_or_default();
    let sanitized: String = segment
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') { ch } else { '_' }
        })
        .take(MAX_FILE_NAME_LENGTH)
        .collect();
    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() || trimmed.chars().all(|ch| ch == '_') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Returns the URL without query string or fragment, for logs and errors.
#[must_use]
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Resolves a [`SourceSpec`] to a local installer.
#[derive(Clone)]
pub struct SourceResolver {
    /// Collaborator used for URL sources.
    downloader: Arc<dyn Downloader>,
    /// Parent directory for download directories (system temp when unset).
    temp_root: Option<PathBuf>,
}

impl SourceResolver {
    /// Creates a resolver backed by `downloader`.
    #[must_use]
    pub fn new(downloader: Arc<dyn Downloader>) -> Self {
        Self {
            downloader,
            temp_root: None,
        }
    }

    /// Places download directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Resolves the source.
    ///
    /// Returns `Ok(None)` when both inputs are unknown. A non-empty file path
    /// wins over a URL and is not checked for existence here.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NoInstallerSource`] when neither input is usable
    /// and [`UploadError::Download`] when the download fails.
    pub fn resolve(
        &self,
        spec: &SourceSpec,
        deadline: &Deadline,
    ) -> Result<Option<InstallerSource>, UploadError> {
        if spec.file_path.is_unknown() && spec.url.is_unknown() {
            return Ok(None);
        }
        if let Some(path) = spec.file_path.non_empty() {
            return Ok(Some(InstallerSource::local(path)));
        }
        let Some(url) = spec.url.non_empty() else {
            return Err(UploadError::NoInstallerSource);
        };
        let download_failure = |source: DownloadError| match source {
            DownloadError::DeadlineExhausted => UploadError::DeadlineExhausted {
                phase: UploadPhase::ResolveSource,
                reason: deadline.exhaustion().unwrap_or(Exhaustion::Expired),
            },
            source => UploadError::Download {
                url: redact_url(url),
                source,
            },
        };
        let temp_dir = self
            .create_temp_dir()
            .map_err(|err| download_failure(DownloadError::Io(err.to_string())))?;
        let path =
            self.downloader.download(url, temp_dir.path(), deadline).map_err(download_failure)?;
        Ok(Some(InstallerSource::downloaded(path, temp_dir)))
    }

    /// Creates a unique download directory.
    fn create_temp_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
