// crates/appcontent-pipeline/src/commit.rs
// ============================================================================
// Module: Commit Coordinator
// Description: Submits the encryption metadata and waits for commit processing.
// Purpose: Drive the content file from uploaded to committed.
// Dependencies: appcontent-core
// ============================================================================

//! ## Overview
//! Commit runs in two polled stages under the shared deadline:
//! - **Submit** retries the commit request until it is accepted. Access
//!   failures (401/403/404), decode errors and request-build errors stop
//!   immediately; every other rejection is retried.
//! - **Await** reads the content file until `commitFileSuccess` or
//!   `commitFileFailed`.
//!
//! Running out of budget in either stage yields [`UploadError::CommitTimeout`]
//! carrying the stage, which is distinct from [`UploadError::CommitFailed`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use appcontent_core::BackendError;
use appcontent_core::ContentBackend;
use appcontent_core::ContentFileRecord;
use appcontent_core::ContentFileRef;
use appcontent_core::Deadline;
use appcontent_core::FileEncryptionInfo;
use appcontent_core::PollError;
use appcontent_core::PollPolicy;
use appcontent_core::PollStep;
use appcontent_core::UploadState;
use appcontent_core::poll_until;

use crate::audit::UploadAuditEvent;
use crate::audit::UploadAuditSink;
use crate::audit::UploadEventKind;
use crate::error::CommitStage;
use crate::error::UploadError;

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Submits and awaits the content file commit.
#[derive(Clone)]
pub struct CommitCoordinator {
    /// Backend client.
    backend: Arc<dyn ContentBackend>,
    /// Poll cadence shared by both stages.
    policy: PollPolicy,
    /// Audit sink.
    audit: Arc<dyn UploadAuditSink>,
}

impl CommitCoordinator {
    /// Creates a coordinator.
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

    /// Submits then awaits the commit.
    ///
    /// # Errors
    ///
    /// See [`CommitCoordinator::submit`] and [`CommitCoordinator::await_commit`].
    pub fn commit(
        &self,
        file: &ContentFileRef,
        info: &FileEncryptionInfo,
        deadline: &Deadline,
    ) -> Result<ContentFileRecord, UploadError> {
        self.submit(file, info, deadline)?;
        self.await_commit(file, deadline)
    }

    /// Submits the commit request, retrying retryable rejections.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Backend`] for non-retryable rejections and
    /// [`UploadError::CommitTimeout`] with [`CommitStage::Submit`] when the
    /// budget runs out.
    pub fn submit(
        &self,
        file: &ContentFileRef,
        info: &FileEncryptionInfo,
        deadline: &Deadline,
    ) -> Result<(), UploadError> {
        let outcome = poll_until(deadline, &self.policy, |attempt| {
            let result = self.backend.commit_content_file(file, info, deadline);
            let event = UploadAuditEvent::new(UploadEventKind::CommitSubmitted, &file.app_id)
                .phase(CommitStage::Submit.phase())
                .file(file)
                .attempt(attempt)
                .ok(result.is_ok());
            let event = match &result {
                Ok(()) => event,
                Err(err) => event.detail(err.to_string()),
            };
            self.audit.record(&event);
            match result {
                Ok(()) => PollStep::Ready(()),
                Err(BackendError::DeadlineExhausted) => PollStep::Pending(None),
                Err(err) if submit_is_fatal(&err) => {
                    PollStep::Fatal(UploadError::Backend {
                        phase: CommitStage::Submit.phase(),
                        source: err,
                    })
                }
                Err(err) => PollStep::Pending(Some(err.to_string())),
            }
        });
        match outcome {
            Ok(_) => Ok(()),
            Err(err) => Err(stage_error(CommitStage::Submit, err)),
        }
    }

    /// Waits until the backend finishes processing the commit.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::CommitFailed`] when the backend reports failure,
    /// [`UploadError::Backend`] for fatal read errors and
    /// [`UploadError::CommitTimeout`] with [`CommitStage::Await`] when the
    /// budget runs out.
    pub fn await_commit(
        &self,
        file: &ContentFileRef,
        deadline: &Deadline,
    ) -> Result<ContentFileRecord, UploadError> {
        let outcome = poll_until(deadline, &self.policy, |attempt| {
            let result = self.backend.get_content_file(file, deadline);
            let event = UploadAuditEvent::new(UploadEventKind::CommitState, &file.app_id)
                .phase(CommitStage::Await.phase())
                .file(file)
                .attempt(attempt);
            let event = match &result {
                Ok(record) => event.state(record.upload_state.as_ref()).ok(true),
                Err(err) => event.ok(false).detail(err.to_string()),
            };
            self.audit.record(&event);
            classify_commit_read(result)
        });
        match outcome {
            Ok(success) => Ok(success.value),
            Err(err) => Err(stage_error(CommitStage::Await, err)),
        }
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Returns true when a commit submission must not be retried.
const fn submit_is_fatal(error: &BackendError) -> bool {
    error.is_access_failure()
        || matches!(error, BackendError::Decode(_) | BackendError::Request(_))
}

/// Maps one commit-await read to a poll step.
fn classify_commit_read(
    result: Result<ContentFileRecord, BackendError>,
) -> PollStep<ContentFileRecord, UploadError> {
    match result {
        Ok(record) => match record.upload_state.clone() {
            Some(UploadState::CommitFileSuccess) => PollStep::Ready(record),
            Some(state @ UploadState::CommitFileFailed) => {
                PollStep::Fatal(UploadError::CommitFailed {
                    state,
                })
            }
            Some(state) => PollStep::Pending(Some(state.as_str().to_string())),
            None => PollStep::Pending(Some("unset".to_string())),
        },
        Err(BackendError::DeadlineExhausted) => PollStep::Pending(None),
        Err(err) if err.is_retryable() => PollStep::Pending(Some(err.to_string())),
        Err(source) => PollStep::Fatal(UploadError::Backend {
            phase: CommitStage::Await.phase(),
            source,
        }),
    }
}

/// Converts a poll failure into a stage-tagged upload error.
fn stage_error(stage: CommitStage, error: PollError<UploadError>) -> UploadError {
    match error {
        PollError::Fatal {
            error, ..
        } => error,
        PollError::Exhausted {
            attempts,
            reason,
            last_observed,
        } => UploadError::CommitTimeout {
            stage,
            attempts,
            reason,
            last_observed,
        },
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
