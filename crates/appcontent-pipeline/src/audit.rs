// crates/appcontent-pipeline/src/audit.rs
// ============================================================================
// Module: Upload Audit Logging
// Description: Structured audit events for pipeline progress and cleanup.
// Purpose: Emit redacted JSON-line events without hard logging dependencies.
// Dependencies: appcontent-core, serde, serde_json
// ============================================================================

//! ## Overview
//! The pipeline reports each step through an [`UploadAuditSink`]. Events are
//! flat JSON objects with an `event` label and a millisecond timestamp, so
//! deployments can route them to their preferred logging pipeline.
//!
//! Events never carry key material, and storage endpoints are recorded only
//! in redacted form (no query string).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use appcontent_core::AppId;
use appcontent_core::ContentFileId;
use appcontent_core::ContentFileRef;
use appcontent_core::ContentVersionId;
use appcontent_core::UploadState;
use serde::Serialize;

use crate::error::UploadPhase;

// ============================================================================
// SECTION: Event Kinds
// ============================================================================

/// Audit event label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadEventKind {
    /// Installer source resolved (or nothing to upload).
    SourceResolved,
    /// Encrypted payload written.
    PayloadEncrypted,
    /// Content version allocated.
    ContentVersionCreated,
    /// Content file registered.
    ContentFileRegistered,
    /// One state poll completed.
    PollAttempt,
    /// Storage endpoint issued.
    StorageEndpointReady,
    /// One storage block accepted.
    BlockUploaded,
    /// Block list committed.
    BlobCommitted,
    /// Commit request accepted.
    CommitSubmitted,
    /// Commit processing state observed.
    CommitState,
    /// App repointed at the committed version.
    VersionPublished,
    /// Local artifact cleanup result.
    Cleanup,
    /// Invocation failed.
    PipelineFailed,
    /// Invocation succeeded.
    PipelineSucceeded,
}

// ============================================================================
// SECTION: Event Payload
// ============================================================================

/// Pipeline audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadAuditEvent {
    /// Event identifier.
    pub event: UploadEventKind,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// App the invocation targets.
    pub app_id: String,
    /// Phase the event belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<UploadPhase>,
    /// Content version identifier when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_version_id: Option<String>,
    /// Content file identifier when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_file_id: Option<String>,
    /// Observed upload state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_state: Option<String>,
    /// Attempt or block number (1-based).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    /// Byte count relevant to the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    /// Whether the step succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Free-form redacted detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl UploadAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event: UploadEventKind, app_id: &AppId) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            app_id: app_id.to_string(),
            phase: None,
            content_version_id: None,
            content_file_id: None,
            upload_state: None,
            attempt: None,
            bytes: None,
            ok: None,
            detail: None,
        }
    }

    /// Sets the phase.
    #[must_use]
    pub const fn phase(mut self, phase: UploadPhase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Sets the content version identifier.
    #[must_use]
    pub fn version(mut self, version: &ContentVersionId) -> Self {
        self.content_version_id = Some(version.to_string());
        self
    }

    /// Sets the content file identifier.
    #[must_use]
    pub fn file_id(mut self, file: &ContentFileId) -> Self {
        self.content_file_id = Some(file.to_string());
        self
    }

    /// Sets both identifiers from a file reference.
    #[must_use]
    pub fn file(self, file: &ContentFileRef) -> Self {
        self.version(&file.content_version_id).file_id(&file.content_file_id)
    }

    /// Sets the observed state; `None` is recorded as `unset`.
    #[must_use]
    pub fn state(mut self, state: Option<&UploadState>) -> Self {
        self.upload_state = Some(state.map_or_else(|| "unset".to_string(), ToString::to_string));
        self
    }

    /// Sets the attempt or block number.
    #[must_use]
    pub const fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    /// Sets the byte count.
    #[must_use]
    pub const fn bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }

    /// Sets the success flag.
    #[must_use]
    pub const fn ok(mut self, ok: bool) -> Self {
        self.ok = Some(ok);
        self
    }

    /// Sets the detail text.
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for pipeline events.
pub trait UploadAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &UploadAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl UploadAuditSink for StderrAuditSink {
    fn record(&self, event: &UploadAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// Open audit log handle.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens (or creates) the audit log file for appending.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl UploadAuditSink for FileAuditSink {
    fn record(&self, event: &UploadAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl UploadAuditSink for NoopAuditSink {
    fn record(&self, _event: &UploadAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in order.
    events: Mutex<Vec<UploadAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<UploadAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the recorded event labels in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<UploadEventKind> {
        self.events().iter().map(|event| event.event).collect()
    }
}

impl UploadAuditSink for MemoryAuditSink {
    fn record(&self, event: &UploadAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
