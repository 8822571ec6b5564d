// crates/appcontent-pipeline/src/transfer.rs
// ============================================================================
// Module: Blob Uploader
// Description: Pipeline stage wrapping a `BlobStore` transfer.
// Purpose: Guard the encrypted-only invariant and report block progress.
// Dependencies: appcontent-core
// ============================================================================

//! ## Overview
//! [`BlobUploader`] refuses anything that is not an encrypted `.bin` payload
//! before the store sees it, forwards per-block progress to the audit sink,
//! and maps store failures to [`UploadError::Transfer`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use appcontent_core::BlobError;
use appcontent_core::BlobReceipt;
use appcontent_core::BlobStore;
use appcontent_core::ContentFileRef;
use appcontent_core::Deadline;
use appcontent_core::EncryptedPayload;
use appcontent_core::Exhaustion;
use appcontent_core::ProgressCallback;
use appcontent_core::StorageEndpoint;
use appcontent_core::TransferProgress;
use appcontent_core::is_encrypted_path;

use crate::audit::UploadAuditEvent;
use crate::audit::UploadAuditSink;
use crate::audit::UploadEventKind;
use crate::error::UploadError;
use crate::error::UploadPhase;
use crate::error::ensure_budget;

// ============================================================================
// SECTION: Progress Adapter
// ============================================================================

/// Forwards transfer progress to the audit sink as `block_uploaded` events.
struct AuditProgress<'a> {
    /// Target content file.
    file: &'a ContentFileRef,
    /// Audit sink.
    audit: &'a dyn UploadAuditSink,
}

impl ProgressCallback for AuditProgress<'_> {
    fn on_progress(&self, progress: &TransferProgress) {
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::BlockUploaded, &self.file.app_id)
                .phase(UploadPhase::Transfer)
                .file(self.file)
                .attempt(progress.blocks_sent)
                .bytes(progress.bytes_sent)
                .detail(format!("{}/{}", progress.blocks_sent, progress.blocks_total)),
        );
    }
}

// ============================================================================
// SECTION: Uploader
// ============================================================================

/// Transfers the encrypted payload to the storage endpoint.
#[derive(Clone)]
pub struct BlobUploader {
    /// Storage client.
    store: Arc<dyn BlobStore>,
    /// Audit sink.
    audit: Arc<dyn UploadAuditSink>,
}

impl BlobUploader {
    /// Creates an uploader.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>, audit: Arc<dyn UploadAuditSink>) -> Self {
        Self {
            store,
            audit,
        }
    }

    /// Uploads `payload` to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Transfer`] when the payload is not encrypted or
    /// the store fails, and [`UploadError::DeadlineExhausted`] when no budget
    /// remains before or during the transfer.
    pub fn upload(
        &self,
        file: &ContentFileRef,
        endpoint: &StorageEndpoint,
        payload: &EncryptedPayload,
        deadline: &Deadline,
    ) -> Result<BlobReceipt, UploadError> {
        if !is_encrypted_path(&payload.path) {
            return Err(UploadError::Transfer(BlobError::NotEncrypted(
                payload.path.display().to_string(),
            )));
        }
        ensure_budget(UploadPhase::Transfer, deadline)?;
        let progress = AuditProgress {
            file,
            audit: self.audit.as_ref(),
        };
        let receipt =
            self.store.upload(endpoint, &payload.path, deadline, Some(&progress)).map_err(
                |err| match err {
                    BlobError::DeadlineExhausted {
                        ..
                    } => UploadError::DeadlineExhausted {
                        phase: UploadPhase::Transfer,
                        reason: deadline.exhaustion().unwrap_or(Exhaustion::Expired),
                    },
                    other => UploadError::Transfer(other),
                },
            )?;
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::BlobCommitted, &file.app_id)
                .phase(UploadPhase::Transfer)
                .file(file)
                .attempt(receipt.blocks)
                .bytes(receipt.bytes)
                .ok(true),
        );
        Ok(receipt)
    }
}
