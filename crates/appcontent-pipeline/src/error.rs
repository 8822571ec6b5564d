// crates/appcontent-pipeline/src/error.rs
// ============================================================================
// Module: Upload Errors
// Description: Typed pipeline failures tagged with the phase that raised them.
// Purpose: Let callers tell timeouts, rejections, and local failures apart.
// Dependencies: appcontent-core, thiserror
// ============================================================================

//! ## Overview
//! Every stage returns [`UploadError`]. The orchestrator propagates the first
//! error unchanged after cleanup, so the variant and [`UploadError::phase`]
//! always describe the step that actually failed. Timeouts and cancellation
//! are distinct from backend rejections.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use appcontent_core::BackendError;
use appcontent_core::BlobError;
use appcontent_core::Deadline;
use appcontent_core::Exhaustion;
use appcontent_core::UploadState;
use serde::Serialize;
use thiserror::Error;

use crate::encrypt::EncryptError;
use crate::source::DownloadError;

// ============================================================================
// SECTION: Phases
// ============================================================================

/// Pipeline step that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    /// Resolving the installer source (local path or download).
    ResolveSource,
    /// Encrypting the installer into the `.bin` payload.
    Encrypt,
    /// Creating the content version and content file.
    Register,
    /// Waiting for the storage endpoint.
    AwaitEndpoint,
    /// Transferring the encrypted payload.
    Transfer,
    /// Submitting the commit request.
    CommitSubmit,
    /// Waiting for commit processing.
    CommitAwait,
    /// Repointing the app at the committed version.
    Publish,
    /// Reading the final content file state.
    Finalize,
}

impl UploadPhase {
    /// Returns the stable snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResolveSource => "resolve_source",
            Self::Encrypt => "encrypt",
            Self::Register => "register",
            Self::AwaitEndpoint => "await_endpoint",
            Self::Transfer => "transfer",
            Self::CommitSubmit => "commit_submit",
            Self::CommitAwait => "commit_await",
            Self::Publish => "publish",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for UploadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit sub-step that ran out of budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    /// The commit request was never accepted.
    Submit,
    /// The commit was accepted but never finished processing.
    Await,
}

impl CommitStage {
    /// Returns the pipeline phase for the stage.
    #[must_use]
    pub const fn phase(self) -> UploadPhase {
        match self {
            Self::Submit => UploadPhase::CommitSubmit,
            Self::Await => UploadPhase::CommitAwait,
        }
    }
}

// ============================================================================
// SECTION: Upload Error
// ============================================================================

/// Top-level failure of one pipeline invocation.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Neither a file path nor a URL was supplied.
    #[error("resolve_source: no installer source (file path and url are both empty)")]
    NoInstallerSource,
    /// The installer download failed.
    #[error("resolve_source: download of {url} failed: {source}")]
    Download {
        /// Source URL (query string removed).
        url: String,
        /// Underlying download failure.
        #[source]
        source: DownloadError,
    },
    /// Local encryption failed.
    #[error("encrypt: {0}")]
    Encrypt(#[from] EncryptError),
    /// A single-shot backend request failed (rejected or unreachable).
    #[error("{phase}: backend request failed: {source}")]
    Backend {
        /// Phase that issued the request.
        phase: UploadPhase,
        /// Underlying backend failure.
        #[source]
        source: BackendError,
    },
    /// The backend refused to issue a storage endpoint.
    #[error("await_endpoint: backend rejected storage endpoint request (state {state})")]
    UploadEndpointFailed {
        /// Reported state.
        state: UploadState,
    },
    /// The storage endpoint never became available within the budget.
    #[error(
        "await_endpoint: timed out ({reason}) after {attempts} polls, last state {}",
        .last_observed.as_deref().unwrap_or("unset")
    )]
    UploadEndpointTimeout {
        /// Poll attempts made.
        attempts: u32,
        /// Expired or cancelled.
        reason: Exhaustion,
        /// Last observed state label.
        last_observed: Option<String>,
    },
    /// The backend reported success but supplied no storage endpoint.
    #[error("await_endpoint: backend reported success without a storage uri")]
    MissingStorageUri,
    /// The storage transfer failed.
    #[error("transfer: {0}")]
    Transfer(#[source] BlobError),
    /// The commit did not complete within the budget.
    #[error(
        "{}: timed out ({reason}) after {attempts} attempts, last observed {}",
        .stage.phase(),
        .last_observed.as_deref().unwrap_or("nothing")
    )]
    CommitTimeout {
        /// Commit sub-step.
        stage: CommitStage,
        /// Attempts made.
        attempts: u32,
        /// Expired or cancelled.
        reason: Exhaustion,
        /// Last observed state or error label.
        last_observed: Option<String>,
    },
    /// The backend reported commit failure.
    #[error("commit_await: backend rejected commit (state {state})")]
    CommitFailed {
        /// Reported state.
        state: UploadState,
    },
    /// The budget ran out between or during single-shot steps.
    #[error("{phase}: {reason} before the step completed")]
    DeadlineExhausted {
        /// Phase that could not run.
        phase: UploadPhase,
        /// Expired or cancelled.
        reason: Exhaustion,
    },
}

impl UploadError {
    /// Returns the phase that produced the error.
    #[must_use]
    pub const fn phase(&self) -> UploadPhase {
        match self {
            Self::NoInstallerSource | Self::Download { .. } => UploadPhase::ResolveSource,
            Self::Encrypt(_) => UploadPhase::Encrypt,
            Self::Backend { phase, .. } | Self::DeadlineExhausted { phase, .. } => *phase,
            Self::UploadEndpointFailed { .. }
            | Self::UploadEndpointTimeout { .. }
            | Self::MissingStorageUri => UploadPhase::AwaitEndpoint,
            Self::Transfer(_) => UploadPhase::Transfer,
            Self::CommitTimeout { stage, .. } => stage.phase(),
            Self::CommitFailed { .. } => UploadPhase::CommitAwait,
        }
    }

    /// Returns the budget exhaustion reason when the error is a timeout or cancellation.
    #[must_use]
    pub const fn exhaustion(&self) -> Option<Exhaustion> {
        match self {
            Self::UploadEndpointTimeout { reason, .. }
            | Self::CommitTimeout { reason, .. }
            | Self::DeadlineExhausted { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Returns true when the shared deadline expired.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.exhaustion() == Some(Exhaustion::Expired)
    }

    /// Returns true when the caller cancelled the invocation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.exhaustion() == Some(Exhaustion::Cancelled)
    }

    /// Returns true when the backend explicitly refused the operation.
    ///
    /// Transport failures never count: the backend did not answer.
    #[must_use]
    pub const fn is_backend_rejection(&self) -> bool {
        match self {
            Self::Backend {
                source, ..
            } => !matches!(source, BackendError::Transport(_)),
            Self::UploadEndpointFailed { .. }
            | Self::MissingStorageUri
            | Self::CommitFailed { .. } => true,
            _ => false,
        }
    }
}

/// Maps a backend failure to an upload error for `phase`.
///
/// A call skipped for lack of budget becomes [`UploadError::DeadlineExhausted`].
pub(crate) fn backend_failure(
    phase: UploadPhase,
    error: BackendError,
    deadline: &Deadline,
) -> UploadError {
    match error {
        BackendError::DeadlineExhausted => UploadError::DeadlineExhausted {
            phase,
            reason: deadline.exhaustion().unwrap_or(Exhaustion::Expired),
        },
        source => UploadError::Backend {
            phase,
            source,
        },
    }
}

/// Returns a deadline error for `phase` when no budget remains.
pub(crate) fn ensure_budget(phase: UploadPhase, deadline: &Deadline) -> Result<(), UploadError> {
    match deadline.exhaustion() {
        Some(reason) => Err(UploadError::DeadlineExhausted {
            phase,
            reason,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// SECTION: Build Errors
// ============================================================================

/// Errors raised while assembling a pipeline from configuration.
#[derive(Debug, Error)]
pub enum PipelineBuildError {
    /// Backend client could not be created.
    #[error("backend setup failed: {0}")]
    Backend(String),
    /// Storage client could not be created.
    #[error("storage setup failed: {0}")]
    Storage(String),
    /// Downloader could not be created.
    #[error("downloader setup failed: {0}")]
    Download(String),
    /// Audit sink could not be opened.
    #[error("audit sink setup failed: {0}")]
    Audit(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
