// crates/appcontent-core/src/core/state.rs
// ============================================================================
// Module: Upload State
// Description: Backend-reported upload/commit lifecycle of a content file.
// Purpose: Parse the wire enum into a closed set plus a lossless fallback.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The backend drives a content file through two phases: storage-endpoint
//! request (`pending` to `azureStorageUriRequestSuccess` or
//! `azureStorageUriRequestFailed`) and commit (`commitFilePending` to
//! `commitFileSuccess` or `commitFileFailed`). The client only observes the
//! state by polling. Values this crate does not model are kept verbatim in
//! [`UploadState::Other`] and treated as "still in progress" by pollers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Upload State
// ============================================================================

/// Wire label for the initial pending state.
const PENDING: &str = "pending";
/// Alternate wire label the backend uses for the pending endpoint request.
const PENDING_ALIAS: &str = "azureStorageUriRequestPending";
/// Wire label for a granted storage endpoint.
const URI_SUCCESS: &str = "azureStorageUriRequestSuccess";
/// Wire label for a refused storage endpoint.
const URI_FAILED: &str = "azureStorageUriRequestFailed";
/// Wire label for an in-flight commit.
const COMMIT_PENDING: &str = "commitFilePending";
/// Wire label for a processed commit.
const COMMIT_SUCCESS: &str = "commitFileSuccess";
/// Wire label for a failed commit.
const COMMIT_FAILED: &str = "commitFileFailed";

/// Upload lifecycle state reported by the backend for a content file.
///
/// # Invariants
/// - `Other` never holds a label that maps to a named variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UploadState {
    /// Storage endpoint request has not completed.
    Pending,
    /// A writable storage endpoint was issued.
    AzureStorageUriRequestSuccess,
    /// The backend refused to issue a storage endpoint.
    AzureStorageUriRequestFailed,
    /// Commit has been accepted and is being processed.
    CommitFilePending,
    /// Commit completed; the file is fully processed.
    CommitFileSuccess,
    /// Commit failed on the backend.
    CommitFileFailed,
    /// Any other backend label, preserved verbatim.
    Other(String),
}

impl UploadState {
    /// Returns the wire label for the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => PENDING,
            Self::AzureStorageUriRequestSuccess => URI_SUCCESS,
            Self::AzureStorageUriRequestFailed => URI_FAILED,
            Self::CommitFilePending => COMMIT_PENDING,
            Self::CommitFileSuccess => COMMIT_SUCCESS,
            Self::CommitFileFailed => COMMIT_FAILED,
            Self::Other(label) => label,
        }
    }

    /// Returns true for states the backend never leaves on its own.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AzureStorageUriRequestFailed | Self::CommitFileSuccess | Self::CommitFileFailed
        )
    }

    /// Returns true for backend-reported failures.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::AzureStorageUriRequestFailed | Self::CommitFileFailed)
    }
}

impl From<String> for UploadState {
    fn from(value: String) -> Self {
        match value.as_str() {
            PENDING | PENDING_ALIAS => Self::Pending,
            URI_SUCCESS => Self::AzureStorageUriRequestSuccess,
            URI_FAILED => Self::AzureStorageUriRequestFailed,
            COMMIT_PENDING => Self::CommitFilePending,
            COMMIT_SUCCESS => Self::CommitFileSuccess,
            COMMIT_FAILED => Self::CommitFileFailed,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for UploadState {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<UploadState> for String {
    fn from(value: UploadState) -> Self {
        match value {
            UploadState::Other(label) => label,
            named => named.as_str().to_string(),
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
