// crates/appcontent-pipeline/src/blob.rs
// ============================================================================
// Module: Azure Block Blob Store
// Description: Block-wise transfer of the encrypted payload to a SAS URI.
// Purpose: Push `.bin` payloads using the put-block / put-block-list protocol.
// Dependencies: appcontent-core, base64, reqwest, url
// ============================================================================

//! ## Overview
//! [`AzureBlobStore`] reads the encrypted payload one block at a time and
//! issues `PUT <sas>&comp=block&blockid=<id>` per block, then commits the
//! ordered list with `PUT <sas>&comp=blocklist`. Block ids are base64 of a
//! fixed-width counter, so every id has the same length.
//!
//! Any transport error or non-2xx status aborts the transfer; blocks are not
//! retried. Errors never include the SAS query string.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use appcontent_core::BlobError;
use appcontent_core::BlobReceipt;
use appcontent_core::BlobStore;
use appcontent_core::Deadline;
use appcontent_core::ProgressCallback;
use appcontent_core::StorageEndpoint;
use appcontent_core::TransferProgress;
use appcontent_core::is_encrypted_path;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default block size (6 MiB).
pub const DEFAULT_BLOCK_SIZE: u64 = 6 * 1024 * 1024;
/// Most uncommitted blocks a block blob accepts.
pub const MAX_BLOCKS: u64 = 50_000;
/// Header naming the blob type on commit.
const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";

// ============================================================================
// SECTION: Block Planning
// ============================================================================

/// Returns the block id for a zero-based block index.
#[must_use]
pub fn block_id(index: u32) -> String {
    STANDARD.encode(format!("block-{index:08}"))
}

/// Returns the number of blocks needed for `total` bytes.
#[must_use]
pub const fn block_count(total: u64, block_size: u64) -> u64 {
    if block_size == 0 { 0 } else { total.div_ceil(block_size) }
}

/// Renders the block-list commit body.
#[must_use]
pub fn block_list_xml(ids: &[String]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
    for id in ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Azure block-blob transfer client.
///
/// # Invariants
/// - `block_size > 0`.
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    /// HTTP client used for storage requests.
    client: Client,
    /// Bytes per block.
    block_size: u64,
    /// Per-request timeout cap.
    request_timeout: Duration,
}

impl AzureBlobStore {
    /// Builds a store with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError`] when the block size is zero or the client cannot be built.
    pub fn new(block_size: u64, request_timeout: Duration) -> Result<Self, BlobError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|err| BlobError::Transport(err.to_string()))?;
        Self::with_client(client, block_size, request_timeout)
    }

    /// Creates a store with a preconfigured client.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError`] when the block size is zero.
    pub fn with_client(
        client: Client,
        block_size: u64,
        request_timeout: Duration,
    ) -> Result<Self, BlobError> {
        if block_size == 0 {
            return Err(BlobError::Io("block size must be greater than zero".to_string()));
        }
        Ok(Self {
            client,
            block_size,
            request_timeout,
        })
    }

    /// Builds the endpoint URL with extra query parameters.
    fn endpoint_url(
        endpoint: &StorageEndpoint,
        params: &[(&str, &str)],
    ) -> Result<Url, BlobError> {
        let mut url = Url::parse(endpoint.expose()).map_err(|err| {
            BlobError::InvalidEndpoint(format!("{}: {err}", endpoint.redacted()))
        })?;
        match url.scheme() {
            "https" | "http" => {}
            scheme => {
                return Err(BlobError::InvalidEndpoint(format!("unsupported scheme {scheme}")));
            }
        }
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Sends one storage request bounded by the shared deadline.
    fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        deadline: &Deadline,
        blocks_sent: u32,
    ) -> Result<(), BlobError> {
        let Some(timeout) = deadline.request_timeout(self.request_timeout) else {
            return Err(BlobError::DeadlineExhausted {
                blocks_sent,
            });
        };
        let response = request.timeout(timeout).send().map_err(|err| {
            if err.is_timeout() && deadline.is_exhausted() {
                BlobError::DeadlineExhausted {
                    blocks_sent,
                }
            } else {
                BlobError::Transport(err.without_url().to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::Status {
                operation,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

impl BlobStore for AzureBlobStore {
    fn upload(
        &self,
        endpoint: &StorageEndpoint,
        payload: &Path,
        deadline: &Deadline,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<BlobReceipt, BlobError> {
        if !is_encrypted_path(payload) {
            return Err(BlobError::NotEncrypted(payload.display().to_string()));
        }
        let mut file = File::open(payload).map_err(|err| BlobError::Io(err.to_string()))?;
        let bytes_total = file.metadata().map_err(|err| BlobError::Io(err.to_string()))?.len();
        let planned = block_count(bytes_total, self.block_size);
        if planned > MAX_BLOCKS {
            return Err(BlobError::Io(format!(
                "payload needs {planned} blocks; storage accepts at most {MAX_BLOCKS}"
            )));
        }
        let blocks_total = u32::try_from(planned).map_err(|err| BlobError::Io(err.to_string()))?;

        let mut ids = Vec::with_capacity(usize::try_from(planned).unwrap_or_default());
        let mut bytes_sent = 0u64;
        for index in 0..blocks_total {
            let mut chunk = Vec::new();
            (&mut file)
                .take(self.block_size)
                .read_to_end(&mut chunk)
                .map_err(|err| BlobError::Io(err.to_string()))?;
            if chunk.is_empty() {
                return Err(BlobError::Io("payload shrank during transfer".to_string()));
            }
            let id = block_id(index);
            let url = Self::endpoint_url(endpoint, &[("comp", "block"), ("blockid", &id)])?;
            let length = chunk.len() as u64;
            self.send("put_block", self.client.put(url).body(chunk), deadline, index)?;
            ids.push(id);
            bytes_sent += length;
            if let Some(callback) = progress {
                callback.on_progress(&TransferProgress {
                    blocks_sent: index + 1,
                    blocks_total,
                    bytes_sent,
                    bytes_total,
                });
            }
        }

        let url = Self::endpoint_url(endpoint, &[("comp", "blocklist")])?;
        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/xml")
            .header(BLOB_TYPE_HEADER, "BlockBlob")
            .body(block_list_xml(&ids));
        self.send("put_block_list", request, deadline, blocks_total)?;
        Ok(BlobReceipt {
            blocks: blocks_total,
            bytes: bytes_sent,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
