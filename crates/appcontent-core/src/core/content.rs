// crates/appcontent-core/src/core/content.rs
// ============================================================================
// Module: App Content Records
// Description: Content version, content file, and payload descriptors.
// Purpose: Typed views of the backend objects the upload pipeline touches.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! These types mirror only the backend fields the upload pipeline reads or
//! writes. Fields the backend may omit are `Option` rather than defaulted so
//! "absent" stays distinguishable from "empty".

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ContentFileId;
use crate::core::identifiers::ContentVersionId;
use crate::core::state::UploadState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// File extension appended to the plaintext path for the encrypted payload.
pub const ENCRYPTED_EXTENSION: &str = "bin";

// ============================================================================
// SECTION: Content Version
// ============================================================================

/// Backend container grouping the files of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVersion {
    /// Backend-assigned version identifier.
    pub id: ContentVersionId,
}

// ============================================================================
// SECTION: Content File
// ============================================================================

/// Metadata registered for a new content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFileSpec {
    /// File name presented to the backend.
    pub name: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Encrypted payload size in bytes.
    pub size_encrypted: u64,
    /// Whether the file is a dependency of another file.
    pub is_dependency: bool,
}

/// Backend-tracked record of one file's upload and commit progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFileRecord {
    /// Backend-assigned file identifier.
    pub id: ContentFileId,
    /// Registered file name.
    #[serde(default)]
    pub name: Option<String>,
    /// Registered plaintext size.
    #[serde(default)]
    pub size: Option<u64>,
    /// Registered encrypted size.
    #[serde(default)]
    pub size_encrypted: Option<u64>,
    /// Current upload state; absent before the backend starts processing.
    #[serde(default)]
    pub upload_state: Option<UploadState>,
    /// Writable storage endpoint once issued.
    #[serde(default)]
    pub azure_storage_uri: Option<String>,
    /// Expiration timestamp of the storage endpoint.
    #[serde(default)]
    pub azure_storage_uri_expiration_date_time: Option<String>,
    /// Whether the backend reports the file as committed.
    #[serde(default)]
    pub is_committed: Option<bool>,
}

impl ContentFileRecord {
    /// Returns the storage endpoint when present and non-empty.
    #[must_use]
    pub fn storage_endpoint(&self) -> Option<StorageEndpoint> {
        self.azure_storage_uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .map(StorageEndpoint::new)
    }
}

// ============================================================================
// SECTION: Storage Endpoint
// ============================================================================

/// Time-limited, pre-authorized storage URI issued by the backend.
///
/// # Invariants
/// - `Display` and [`StorageEndpoint::redacted`] never include the query string,
///   which carries the access signature.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageEndpoint(String);

impl StorageEndpoint {
    /// Wraps a storage URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Returns the full URI including the access signature.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns the URI without its query string.
    #[must_use]
    pub fn redacted(&self) -> &str {
        self.0.split_once('?').map_or(self.0.as_str(), |(base, _)| base)
    }
}

impl fmt::Display for StorageEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.redacted())
    }
}

impl fmt::Debug for StorageEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageEndpoint").field(&self.redacted()).finish()
    }
}

// ============================================================================
// SECTION: Encrypted Payload
// ============================================================================

/// Encrypted sibling of an installer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Path of the encrypted file (`<source>.bin`).
    pub path: PathBuf,
    /// Plaintext size in bytes.
    pub original_size: u64,
    /// Encrypted file size in bytes.
    pub encrypted_size: u64,
}

/// Returns the encrypted payload path for a plaintext installer path.
#[must_use]
pub fn encrypted_path_for(source: &Path) -> PathBuf {
    let mut raw = source.as_os_str().to_os_string();
    raw.push(".");
    raw.push(ENCRYPTED_EXTENSION);
    PathBuf::from(raw)
}

/// Returns true when the path carries the encrypted payload extension.
#[must_use]
pub fn is_encrypted_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == ENCRYPTED_EXTENSION)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
