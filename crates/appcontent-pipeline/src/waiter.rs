// crates/appcontent-pipeline/src/waiter.rs
// ============================================================================
// Module: Upload Endpoint Waiter
// Description: Polls the content file until a storage endpoint is issued.
// Purpose: Turn the backend's asynchronous endpoint provisioning into a result.
// Dependencies: appcontent-core
// ============================================================================

//! ## Overview
//! The waiter reads the content file record under the shared deadline:
//! - unset, pending, unknown states and retryable read errors keep polling
//! - `azureStorageUriRequestSuccess` stops with the endpoint
//! - `azureStorageUriRequestFailed` and fatal read errors stop immediately
//!
//! A success record without a URI gets one follow-up read; if that still has
//! no URI the run fails with [`UploadError::MissingStorageUri`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use appcontent_core::BackendError;
use appcontent_core::ContentBackend;
use appcontent_core::ContentFileRecord;
use appcontent_core::ContentFileRef;
use appcontent_core::Deadline;
use appcontent_core::PollError;
use appcontent_core::PollPolicy;
use appcontent_core::PollStep;
use appcontent_core::StorageEndpoint;
use appcontent_core::UploadState;
use appcontent_core::poll_until;

use crate::audit::UploadAuditEvent;
use crate::audit::UploadAuditSink;
use crate::audit::UploadEventKind;
use crate::error::UploadError;
use crate::error::UploadPhase;
use crate::error::backend_failure;

// ============================================================================
// SECTION: Waiter
// ============================================================================

/// Polls for the writable storage endpoint of a content file.
#[derive(Clone)]
pub struct UploadEndpointWaiter {
    /// Backend client.
    backend: Arc<dyn ContentBackend>,
    /// Poll cadence.
    policy: PollPolicy,
    /// Audit sink.
    audit: Arc<dyn UploadAuditSink>,
}

impl UploadEndpointWaiter {
    /// Creates a waiter.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ContentBackend>,
        policy: PollPolicy,
        audit: Arc<dyn UploadAuditSink>,
    ) -> Self {
        Self {
            backend,
            policy,
            audit,
        }
    }

    /// Waits for the storage endpoint of `file`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::UploadEndpointFailed`] when the backend refuses,
    /// [`UploadError::UploadEndpointTimeout`] when the budget runs out,
    /// [`UploadError::MissingStorageUri`] when success carries no URI, and
    /// [`UploadError::Backend`] for fatal read errors.
    pub fn wait(
        &self,
        file: &ContentFileRef,
        deadline: &Deadline,
    ) -> Result<StorageEndpoint, UploadError> {
        let outcome = poll_until(deadline, &self.policy, |attempt| {
            let result = self.backend.get_content_file(file, deadline);
            self.record_attempt(file, attempt, &result);
            classify(result)
        });
        let record = match outcome {
            Ok(success) => success.value,
            Err(PollError::Fatal {
                error, ..
            }) => return Err(error),
            Err(PollError::Exhausted {
                attempts,
                reason,
                last_observed,
            }) => {
                return Err(UploadError::UploadEndpointTimeout {
                    attempts,
                    reason,
                    last_observed,
                });
            }
        };
        let endpoint = match record.storage_endpoint() {
            Some(endpoint) => endpoint,
            None => self
                .backend
                .get_content_file(file, deadline)
                .map_err(|err| backend_failure(UploadPhase::AwaitEndpoint, err, deadline))?
                .storage_endpoint()
                .ok_or(UploadError::MissingStorageUri)?,
        };
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::StorageEndpointReady, &file.app_id)
                .phase(UploadPhase::AwaitEndpoint)
                .file(file)
                .state(Some(&UploadState::AzureStorageUriRequestSuccess))
                .detail(endpoint.redacted()),
        );
        Ok(endpoint)
    }

    /// Emits a `poll_attempt` event for one read.
    fn record_attempt(
        &self,
        file: &ContentFileRef,
        attempt: u32,
        result: &Result<ContentFileRecord, BackendError>,
    ) {
        let event = UploadAuditEvent::new(UploadEventKind::PollAttempt, &file.app_id)
            .phase(UploadPhase::AwaitEndpoint)
            .file(file)
            .attempt(attempt);
        let event = match result {
            Ok(record) => event.state(record.upload_state.as_ref()).ok(true),
            Err(err) => event.ok(false).detail(err.to_string()),
        };
        self.audit.record(&event);
    }
}

/// Maps one read to a poll step.
fn classify(
    result: Result<ContentFileRecord, BackendError>,
) -> PollStep<ContentFileRecord, UploadError> {
    match result {
        Ok(record) => match record.upload_state.clone() {
            Some(UploadState::AzureStorageUriRequestSuccess) => PollStep::Ready(record),
            Some(state @ UploadState::AzureStorageUriRequestFailed) => {
                PollStep::Fatal(UploadError::UploadEndpointFailed {
                    state,
                })
            }
            Some(state) => PollStep::Pending(Some(state.as_str().to_string())),
            None => PollStep::Pending(Some("unset".to_string())),
        },
        Err(BackendError::DeadlineExhausted) => PollStep::Pending(None),
        Err(err) if err.is_retryable() => PollStep::Pending(Some(err.to_string())),
        Err(source) => PollStep::Fatal(UploadError::Backend {
            phase: UploadPhase::AwaitEndpoint,
            source,
        }),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
