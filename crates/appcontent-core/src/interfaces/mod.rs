// crates/appcontent-core/src/interfaces/mod.rs
// ============================================================================
// Module: App Content Interfaces
// Description: Backend and storage contracts consumed by the upload pipeline.
// Purpose: Keep pipeline logic independent of HTTP clients and wire formats.
// Dependencies: crate::core, crate::runtime, thiserror
// ============================================================================

//! ## Overview
//! The pipeline talks to two external systems: the device-management backend
//! ([`ContentBackend`]) and the storage endpoint it issues ([`BlobStore`]).
//! Every call receives the shared [`Deadline`] so implementations can bound
//! their own requests by the remaining budget.
//!
//! [`classify_status`] is the HTTP error classifier that splits failures into
//! retryable and fatal classes for the poll loops.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use thiserror::Error;

use crate::core::AppId;
use crate::core::ContentFileRecord;
use crate::core::ContentFileRef;
use crate::core::ContentFileSpec;
use crate::core::ContentVersion;
use crate::core::ContentVersionId;
use crate::core::ContentVersionRef;
use crate::core::FileEncryptionInfo;
use crate::core::StorageEndpoint;
use crate::runtime::Deadline;

// ============================================================================
// SECTION: Error Classification
// ============================================================================

/// Retry classification for a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The same call may succeed later.
    Retryable,
    /// Retrying cannot help.
    Fatal,
}

/// Classifies an HTTP status code.
///
/// Request timeouts, throttling, and server errors are retryable; every other
/// client error is fatal.
#[must_use]
pub const fn classify_status(status: u16) -> ErrorClass {
    match status {
        408 | 425 | 429 | 500..=599 => ErrorClass::Retryable,
        _ => ErrorClass::Fatal,
    }
}

// ============================================================================
// SECTION: Backend Errors
// ============================================================================

/// Errors returned by [`ContentBackend`] implementations.
///
/// # Invariants
/// - Variants are stable for retry classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The request never produced a response (connect, timeout, reset).
    #[error("backend transport error: {0}")]
    Transport(String),
    /// The backend answered with a non-success status.
    #[error("backend returned http {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Backend-provided error message or code.
        message: String,
    },
    /// The response body did not match the expected shape.
    #[error("backend response decode error: {0}")]
    Decode(String),
    /// The request could not be built (bad URL, bad credentials configuration).
    #[error("backend request error: {0}")]
    Request(String),
    /// No budget remained to issue the request.
    #[error("backend call skipped: deadline exhausted")]
    DeadlineExhausted,
}

impl BackendError {
    /// Returns the retry classification for the error.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) => ErrorClass::Retryable,
            Self::Status {
                status, ..
            } => classify_status(*status),
            Self::Decode(_) | Self::Request(_) | Self::DeadlineExhausted => ErrorClass::Fatal,
        }
    }

    /// Returns true when the error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.class(), ErrorClass::Retryable)
    }

    /// Returns true for authentication, authorization, or missing-resource failures.
    #[must_use]
    pub const fn is_access_failure(&self) -> bool {
        matches!(
            self,
            Self::Status {
                status: 401 | 403 | 404,
                ..
            }
        )
    }

    /// Returns the HTTP status when the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status {
                status, ..
            } => Some(*status),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Content Backend
// ============================================================================

/// Device-management backend operations used by the upload pipeline.
pub trait ContentBackend: Send + Sync {
    /// Allocates a new content version under the app.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the request fails.
    fn create_content_version(
        &self,
        app_id: &AppId,
        deadline: &Deadline,
    ) -> Result<ContentVersion, BackendError>;

    /// Registers a content file within a content version.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the request fails.
    fn create_content_file(
        &self,
        version: &ContentVersionRef,
        spec: &ContentFileSpec,
        deadline: &Deadline,
    ) -> Result<ContentFileRecord, BackendError>;

    /// Reads the current state of a content file.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the request fails.
    fn get_content_file(
        &self,
        file: &ContentFileRef,
        deadline: &Deadline,
    ) -> Result<ContentFileRecord, BackendError>;

    /// Submits encryption metadata to commit an uploaded content file.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the backend rejects the commit.
    fn commit_content_file(
        &self,
        file: &ContentFileRef,
        info: &FileEncryptionInfo,
        deadline: &Deadline,
    ) -> Result<(), BackendError>;

    /// Points the app at a committed content version.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the request fails.
    fn set_committed_content_version(
        &self,
        app_id: &AppId,
        version: &ContentVersionId,
        deadline: &Deadline,
    ) -> Result<(), BackendError>;
}

// ============================================================================
// SECTION: Blob Store
// ============================================================================

/// Errors returned by [`BlobStore`] implementations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The payload path is not an encrypted payload.
    #[error("refusing to upload non-encrypted payload: {0}")]
    NotEncrypted(String),
    /// Local read failure.
    #[error("payload read error: {0}")]
    Io(String),
    /// The storage endpoint URI could not be used.
    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
    /// Network failure while talking to storage.
    #[error("storage transport error: {0}")]
    Transport(String),
    /// Storage answered with a non-success status.
    #[error("storage returned http {status} for {operation}")]
    Status {
        /// Operation that failed (`put_block` or `put_block_list`).
        operation: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// No budget remained to continue the transfer.
    #[error("transfer stopped: deadline exhausted after {blocks_sent} blocks")]
    DeadlineExhausted {
        /// Blocks accepted by storage before the budget ran out.
        blocks_sent: u32,
    },
}

/// Progress snapshot reported after each transferred block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Blocks accepted so far.
    pub blocks_sent: u32,
    /// Total blocks planned.
    pub blocks_total: u32,
    /// Bytes accepted so far.
    pub bytes_sent: u64,
    /// Total bytes planned.
    pub bytes_total: u64,
}

/// Callback for transfer progress reporting.
pub trait ProgressCallback: Send + Sync {
    /// Called after each block is accepted.
    fn on_progress(&self, progress: &TransferProgress);
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobReceipt {
    /// Number of blocks written.
    pub blocks: u32,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Storage endpoint that accepts the encrypted payload.
pub trait BlobStore: Send + Sync {
    /// Transfers the file at `payload` to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError`] when the transfer fails; no block is retried.
    fn upload(
        &self,
        endpoint: &StorageEndpoint,
        payload: &Path,
        deadline: &Deadline,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<BlobReceipt, BlobError>;
}

// ============================================================================
// SECTION: Tests
// ============================================================================
