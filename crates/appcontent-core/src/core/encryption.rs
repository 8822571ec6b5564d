// crates/appcontent-core/src/core/encryption.rs
// ============================================================================
// Module: Encryption Metadata
// Description: Key material and digests for an encrypted content payload.
// Purpose: Carry the values the backend needs to decrypt and verify a file.
// Dependencies: base64, serde, zeroize
// ============================================================================

//! ## Overview
//! [`EncryptionMetadata`] is produced once per encryption and consumed by the
//! commit step. It is never written to durable state.
//! Invariants:
//! - Key material is zeroized on drop.
//! - `Debug` output never includes key material.
//!
//! [`FileEncryptionInfo`] is the base64 wire form submitted on commit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use zeroize::Zeroize;
use zeroize::ZeroizeOnDrop;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Encryption profile identifier understood by the backend.
pub const PROFILE_IDENTIFIER: &str = "ProfileVersion1";
/// Digest algorithm label for the plaintext file digest.
pub const FILE_DIGEST_ALGORITHM: &str = "SHA256";

// ============================================================================
// SECTION: Encryption Metadata
// ============================================================================

/// Integrity and encryption metadata for one encrypted payload.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionMetadata {
    /// Symmetric content key.
    pub encryption_key: Vec<u8>,
    /// HMAC key.
    pub mac_key: Vec<u8>,
    /// HMAC over `IV || ciphertext`.
    pub mac: Vec<u8>,
    /// Cipher initialization vector.
    pub initialization_vector: Vec<u8>,
    /// Digest of the plaintext file.
    pub digest: Vec<u8>,
    /// Algorithm used to compute `digest`.
    pub digest_algorithm: String,
    /// Encryption profile identifier.
    pub profile_identifier: String,
    /// File digest algorithm label submitted on commit.
    pub file_digest_algorithm: String,
}

impl EncryptionMetadata {
    /// Returns the base64 wire form for the commit request.
    #[must_use]
    pub fn to_wire(&self) -> FileEncryptionInfo {
        FileEncryptionInfo {
            encryption_key: STANDARD.encode(&self.encryption_key),
            mac_key: STANDARD.encode(&self.mac_key),
            mac: STANDARD.encode(&self.mac),
            initialization_vector: STANDARD.encode(&self.initialization_vector),
            file_digest: STANDARD.encode(&self.digest),
            file_digest_algorithm: self.file_digest_algorithm.clone(),
            profile_identifier: self.profile_identifier.clone(),
        }
    }

    /// Returns the plaintext digest as base64.
    #[must_use]
    pub fn digest_base64(&self) -> String {
        STANDARD.encode(&self.digest)
    }
}

impl fmt::Debug for EncryptionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionMetadata")
            .field("encryption_key", &"<redacted>")
            .field("mac_key", &"<redacted>")
            .field("mac", &self.mac.len())
            .field("initialization_vector", &self.initialization_vector.len())
            .field("digest", &self.digest_base64())
            .field("digest_algorithm", &self.digest_algorithm)
            .field("profile_identifier", &self.profile_identifier)
            .field("file_digest_algorithm", &self.file_digest_algorithm)
            .finish()
    }
}

// ============================================================================
// SECTION: Wire Form
// ============================================================================

/// Base64-encoded encryption info submitted with a commit.
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct FileEncryptionInfo {
    /// Base64 content key.
    pub encryption_key: String,
    /// Base64 HMAC key.
    pub mac_key: String,
    /// Base64 HMAC.
    pub mac: String,
    /// Base64 initialization vector.
    pub initialization_vector: String,
    /// Base64 plaintext digest.
    pub file_digest: String,
    /// Plaintext digest algorithm label.
    pub file_digest_algorithm: String,
    /// Encryption profile identifier.
    pub profile_identifier: String,
}

impl fmt::Debug for FileEncryptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEncryptionInfo")
            .field("file_digest", &self.file_digest)
            .field("file_digest_algorithm", &self.file_digest_algorithm)
            .field("profile_identifier", &self.profile_identifier)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
