// crates/appcontent-pipeline/src/encrypt.rs
// ============================================================================
// Module: Content Encryptor
// Description: Streaming AES-256-CBC + HMAC-SHA256 payload encryption.
// Purpose: Produce the encrypted `.bin` payload and its commit metadata.
// Dependencies: aes, cbc, hmac, rand, sha2, zeroize
// ============================================================================

//! ## Overview
//! [`ContentEncryptor::encrypt`] reads the plaintext installer once with a
//! fixed-size buffer and writes `<source>.bin` laid out as
//! `MAC(32) || IV(16) || ciphertext`.
//!
//! - Cipher: AES-256-CBC with PKCS#7 padding, fresh random key and IV per call.
//! - MAC: HMAC-SHA256 with a fresh random key over `IV || ciphertext`.
//! - Digest: SHA-256 of the plaintext.
//!
//! The MAC slot is written as zeros first and filled in once the stream ends.
//! A failed run removes the `.bin` it started writing; the plaintext is
//! never modified.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;

use aes::Aes256;
use appcontent_core::EncryptedPayload;
use appcontent_core::EncryptionMetadata;
use appcontent_core::FILE_DIGEST_ALGORITHM;
use appcontent_core::PROFILE_IDENTIFIER;
use appcontent_core::encrypted_path_for;
use cbc::cipher::BlockEncryptMut;
use cbc::cipher::KeyIvInit;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use hmac::Hmac;
use hmac::Mac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// AES-256 key length.
pub const KEY_LENGTH: usize = 32;
/// HMAC-SHA256 key length.
pub const MAC_KEY_LENGTH: usize = 32;
/// AES block and IV length.
pub const IV_LENGTH: usize = 16;
/// HMAC-SHA256 output length.
pub const MAC_LENGTH: usize = 32;
/// Bytes preceding the ciphertext in the payload file.
pub const HEADER_LENGTH: u64 = (MAC_LENGTH + IV_LENGTH) as u64;
/// Default read buffer size (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// AES-256-CBC encryptor.
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
/// HMAC-SHA256.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Encryption failures.
#[derive(Debug, Error)]
pub enum EncryptError {
    /// The plaintext could not be read.
    #[error("cannot read installer {path}: {message}")]
    Read {
        /// Plaintext path.
        path: String,
        /// Underlying error.
        message: String,
    },
    /// The encrypted payload could not be written.
    #[error("cannot write payload {path}: {message}")]
    Write {
        /// Payload path.
        path: String,
        /// Underlying error.
        message: String,
    },
    /// Cipher or MAC initialization failed.
    #[error("cipher error: {0}")]
    Cipher(String),
    /// Encryption failed and the partially written payload could not be removed.
    #[error("{source}; partial payload {path} not removed: {message}")]
    PartialPayload {
        /// Payload path.
        path: String,
        /// Removal error.
        message: String,
        /// Failure that interrupted encryption.
        #[source]
        source: Box<EncryptError>,
    },
}

// ============================================================================
// SECTION: Encryptor
// ============================================================================

/// Streaming payload encryptor.
///
/// # Invariants
/// - `buffer_size` is a non-zero multiple of the AES block size.
#[derive(Debug, Clone, Copy)]
pub struct ContentEncryptor {
    /// Plaintext read buffer size.
    buffer_size: usize,
}

impl Default for ContentEncryptor {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ContentEncryptor {
    /// Creates an encryptor; `buffer_size` is rounded up to a whole number of blocks.
    #[must_use]
    pub const fn with_buffer_size(buffer_size: usize) -> Self {
        let blocks = buffer_size.div_ceil(IV_LENGTH);
        let blocks = if blocks == 0 { 1 } else { blocks };
        Self {
            buffer_size: blocks * IV_LENGTH,
        }
    }

    /// Returns the encrypted payload size for a plaintext of `plain_len` bytes.
    #[must_use]
    pub const fn encrypted_len(plain_len: u64) -> u64 {
        HEADER_LENGTH + (plain_len / IV_LENGTH as u64 + 1) * IV_LENGTH as u64
    }

    /// Encrypts `source` into `<source>.bin`.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptError`] on read, cipher, or write failure. A payload
    /// this call started writing is removed; a pre-existing `<source>.bin` is
    /// left untouched when the plaintext cannot be opened.
    pub fn encrypt(
        &self,
        source: &Path,
    ) -> Result<(EncryptedPayload, EncryptionMetadata), EncryptError> {
        let target = encrypted_path_for(source);
        let input = File::open(source).map_err(|err| EncryptError::Read {
            path: source.display().to_string(),
            message: err.to_string(),
        })?;
        let output = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)
            .map_err(|err| EncryptError::Write {
                path: target.display().to_string(),
                message: err.to_string(),
            })?;
        self.encrypt_into(input, output, source, &target).or_else(|err| {
            match fs::remove_file(&target) {
                Ok(()) => Err(err),
                Err(removal) if removal.kind() == io::ErrorKind::NotFound => Err(err),
                Err(removal) => Err(EncryptError::PartialPayload {
                    path: target.display().to_string(),
                    message: removal.to_string(),
                    source: Box::new(err),
                }),
            }
        })
    }

    /// Streams `input` into `output`, which is already open at `target`.
    fn encrypt_into(
        &self,
        mut input: File,
        mut output: File,
        source: &Path,
        target: &Path,
    ) -> Result<(EncryptedPayload, EncryptionMetadata), EncryptError> {
        let read_error = |err: io::Error| EncryptError::Read {
            path: source.display().to_string(),
            message: err.to_string(),
        };
        let write_error = |err: io::Error| EncryptError::Write {
            path: target.display().to_string(),
            message: err.to_string(),
        };

        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        let mut mac_key = Zeroizing::new([0u8; MAC_KEY_LENGTH]);
        let mut iv = [0u8; IV_LENGTH];
        OsRng.fill_bytes(key.as_mut_slice());
        OsRng.fill_bytes(mac_key.as_mut_slice());
        OsRng.fill_bytes(&mut iv);

        let mut cipher = Aes256CbcEnc::new_from_slices(key.as_slice(), &iv)
            .map_err(|err| EncryptError::Cipher(err.to_string()))?;
        let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_slice())
            .map_err(|err| EncryptError::Cipher(err.to_string()))?;
        let mut digest = Sha256::new();

        output.write_all(&[0u8; MAC_LENGTH]).map_err(write_error)?;
        output.write_all(&iv).map_err(write_error)?;
        mac.update(&iv);

        let mut buffer = Zeroizing::new(vec![0u8; self.buffer_size + IV_LENGTH]);
        let mut pending = 0usize;
        let mut original_size = 0u64;
        loop {
            let read =
                input.read(&mut buffer[pending..self.buffer_size + pending]).map_err(read_error)?;
            if read == 0 {
                break;
            }
            digest.update(&buffer[pending..pending + read]);
            original_size += read as u64;
            let filled = pending + read;
            let whole = filled - filled % IV_LENGTH;
            for block in buffer[..whole].chunks_exact_mut(IV_LENGTH) {
                cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
            }
            mac.update(&buffer[..whole]);
            output.write_all(&buffer[..whole]).map_err(write_error)?;
            buffer.copy_within(whole..filled, 0);
            pending = filled - whole;
        }

        let mut tail = Zeroizing::new([0u8; IV_LENGTH]);
        tail[..pending].copy_from_slice(&buffer[..pending]);
        let last = cipher
            .encrypt_padded_mut::<Pkcs7>(tail.as_mut_slice(), pending)
            .map_err(|err| EncryptError::Cipher(err.to_string()))?;
        mac.update(last);
        output.write_all(last).map_err(write_error)?;

        let mac_bytes = mac.finalize().into_bytes().to_vec();
        output.seek(SeekFrom::Start(0)).map_err(write_error)?;
        output.write_all(&mac_bytes).map_err(write_error)?;
        output.sync_all().map_err(write_error)?;
        let encrypted_size = output.metadata().map_err(write_error)?.len();

        let payload = EncryptedPayload {
            path: target.to_path_buf(),
            original_size,
            encrypted_size,
        };
        let metadata = EncryptionMetadata {
            encryption_key: key.to_vec(),
            mac_key: mac_key.to_vec(),
            mac: mac_bytes,
            initialization_vector: iv.to_vec(),
            digest: digest.finalize().to_vec(),
            digest_algorithm: FILE_DIGEST_ALGORITHM.to_string(),
            profile_identifier: PROFILE_IDENTIFIER.to_string(),
            file_digest_algorithm: FILE_DIGEST_ALGORITHM.to_string(),
        };
        Ok((payload, metadata))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
