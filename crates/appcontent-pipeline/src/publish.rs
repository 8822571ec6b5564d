// crates/appcontent-pipeline/src/publish.rs
// ============================================================================
// Module: Version Publisher
// Description: Points the app at its newly committed content version.
// Purpose: Final backend mutation of a successful upload.
// Dependencies: appcontent-core
// ============================================================================

//! ## Overview
//! Publishing is a single idempotent request. Failure is fatal and the
//! previously committed version is left untouched on the backend.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use appcontent_core::ContentBackend;
use appcontent_core::ContentVersionRef;
use appcontent_core::Deadline;

use crate::audit::UploadAuditEvent;
use crate::audit::UploadAuditSink;
use crate::audit::UploadEventKind;
use crate::error::UploadError;
use crate::error::UploadPhase;
use crate::error::backend_failure;
use crate::error::ensure_budget;

// ============================================================================
// SECTION: Publisher
// ============================================================================

/// Sets the app's committed content version.
#[derive(Clone)]
pub struct VersionPublisher {
    /// Backend client.
    backend: Arc<dyn ContentBackend>,
    /// Audit sink.
    audit: Arc<dyn UploadAuditSink>,
}

impl VersionPublisher {
    /// Creates a publisher.
    #[must_use]
    pub fn new(backend: Arc<dyn ContentBackend>, audit: Arc<dyn UploadAuditSink>) -> Self {
        Self {
            backend,
            audit,
        }
    }

    /// Publishes `version` as the app's committed content version.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError`] tagged [`UploadPhase::Publish`] on any failure.
    pub fn publish(
        &self,
        version: &ContentVersionRef,
        deadline: &Deadline,
    ) -> Result<(), UploadError> {
        ensure_budget(UploadPhase::Publish, deadline)?;
        self.backend
            .set_committed_content_version(&version.app_id, &version.content_version_id, deadline)
            .map_err(|err| backend_failure(UploadPhase::Publish, err, deadline))?;
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::VersionPublished, &version.app_id)
                .phase(UploadPhase::Publish)
                .version(&version.content_version_id)
                .ok(true),
        );
        Ok(())
    }
}
