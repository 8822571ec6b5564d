// crates/appcontent-pipeline/src/registrar.rs
// ============================================================================
// Module: Content Version Registrar
// Description: Creates the content version and registers the content file.
// Purpose: Obtain backend identifiers for one upload attempt.
// Dependencies: appcontent-core
// ============================================================================

//! ## Overview
//! Each call is a single round trip. Failures are not retried here; the
//! orchestrator aborts the run on the first error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use appcontent_core::AppId;
use appcontent_core::ContentBackend;
use appcontent_core::ContentFileRecord;
use appcontent_core::ContentFileRef;
use appcontent_core::ContentFileSpec;
use appcontent_core::ContentVersionRef;
use appcontent_core::Deadline;
use appcontent_core::EncryptedPayload;

use crate::audit::UploadAuditEvent;
use crate::audit::UploadAuditSink;
use crate::audit::UploadEventKind;
use crate::error::UploadError;
use crate::error::UploadPhase;
use crate::error::backend_failure;
use crate::error::ensure_budget;

// ============================================================================
// SECTION: Registrar
// ============================================================================

/// Creates content versions and content files on the backend.
#[derive(Clone)]
pub struct ContentVersionRegistrar {
    /// Backend client.
    backend: Arc<dyn ContentBackend>,
    /// Audit sink.
    audit: Arc<dyn UploadAuditSink>,
}

impl ContentVersionRegistrar {
    /// Creates a registrar.
    #[must_use]
    pub fn new(backend: Arc<dyn ContentBackend>, audit: Arc<dyn UploadAuditSink>) -> Self {
        Self {
            backend,
            audit,
        }
    }

    /// Creates a new content version for `app_id`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] tagged [`UploadPhase::Register`] on any failure.
    pub fn create_version(
        &self,
        app_id: &AppId,
        deadline: &Deadline,
    ) -> Result<ContentVersionRef, UploadError> {
        ensure_budget(UploadPhase::Register, deadline)?;
        let version = self
            .backend
            .create_content_version(app_id, deadline)
            .map_err(|err| backend_failure(UploadPhase::Register, err, deadline))?;
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::ContentVersionCreated, app_id)
                .phase(UploadPhase::Register)
                .version(&version.id),
        );
        Ok(ContentVersionRef::new(app_id.clone(), version.id))
    }

    /// Registers the content file for an encrypted payload.
    ///
    /// `name` is the plaintext installer file name; sizes come from the payload.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] tagged [`UploadPhase::Register`] on any failure.
    pub fn register_file(
        &self,
        version: &ContentVersionRef,
        name: &str,
        payload: &EncryptedPayload,
        deadline: &Deadline,
    ) -> Result<(ContentFileRef, ContentFileRecord), UploadError> {
        ensure_budget(UploadPhase::Register, deadline)?;
        let spec = ContentFileSpec {
            name: name.to_string(),
            size: payload.original_size,
            size_encrypted: payload.encrypted_size,
            is_dependency: false,
        };
        let record = self
            .backend
            .create_content_file(version, &spec, deadline)
            .map_err(|err| backend_failure(UploadPhase::Register, err, deadline))?;
        let file = version.file(record.id.clone());
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::ContentFileRegistered, &version.app_id)
                .phase(UploadPhase::Register)
                .file(&file)
                .state(record.upload_state.as_ref())
                .bytes(payload.encrypted_size),
        );
        Ok((file, record))
    }
}
