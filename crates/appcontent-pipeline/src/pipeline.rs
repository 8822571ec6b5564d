// crates/appcontent-pipeline/src/pipeline.rs
// ============================================================================
// Module: Content Upload Pipeline
// Description: Orchestrates one encrypted installer upload end to end.
// Purpose: Run the upload steps in order under a single shared deadline.
// Dependencies: appcontent-config, appcontent-core, serde
// ============================================================================

//! ## Overview
//! [`ContentUploadPipeline::run`] resolves the installer, encrypts it,
//! registers a content version and file, waits for the storage endpoint,
//! transfers the payload, commits, publishes, and reads the final record.
//! The first error aborts the run and is returned unchanged.
//!
//! Security posture: key material only lives in memory for the duration of
//! the run and never appears in the receipt or audit events.
//!
//! # Invariants
//! - Exactly one deadline bounds every network call and sleep of a run.
//! - The temporary source and the `.bin` payload are released exactly once on
//!   every exit path after the installer was resolved.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use appcontent_config::AppContentConfig;
use appcontent_config::AuditSinkKind;
use appcontent_core::AppId;
use appcontent_core::BlobStore;
use appcontent_core::ContentBackend;
use appcontent_core::ContentFileId;
use appcontent_core::ContentVersionId;
use appcontent_core::Deadline;
use appcontent_core::PollPolicy;
use appcontent_core::UploadState;
use serde::Serialize;

use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::audit::UploadAuditEvent;
use crate::audit::UploadAuditSink;
use crate::audit::UploadEventKind;
use crate::blob::AzureBlobStore;
use crate::commit::CommitCoordinator;
use crate::encrypt::ContentEncryptor;
use crate::error::PipelineBuildError;
use crate::error::UploadError;
use crate::error::UploadPhase;
use crate::error::backend_failure;
use crate::error::ensure_budget;
use crate::graph::GraphContentBackend;
use crate::graph::GraphSettings;
use crate::publish::VersionPublisher;
use crate::registrar::ContentVersionRegistrar;
use crate::source::Downloader;
use crate::source::HttpDownloader;
use crate::source::HttpDownloaderSettings;
use crate::source::InstallerSource;
use crate::source::SourceResolver;
use crate::source::SourceSpec;
use crate::transfer::BlobUploader;
use crate::waiter::UploadEndpointWaiter;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Summary of a committed upload.
///
/// Carries no key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    /// Target app.
    pub app_id: AppId,
    /// Committed content version.
    pub content_version_id: ContentVersionId,
    /// Committed content file.
    pub content_file_id: ContentFileId,
    /// Upload state from the final read.
    pub upload_state: Option<UploadState>,
    /// Commit flag from the final read.
    pub is_committed: Option<bool>,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Encrypted payload size in bytes.
    pub size_encrypted: u64,
    /// Storage blocks transferred.
    pub blocks: u32,
    /// Base64 SHA-256 digest of the plaintext.
    pub file_digest: String,
    /// Digest algorithm label.
    pub file_digest_algorithm: String,
    /// Wall time spent in the run.
    pub elapsed_ms: u64,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The source inputs are not known yet; nothing was done.
    NothingToUpload,
    /// The installer was uploaded, committed and published.
    Committed(UploadReceipt),
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Tunables for a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Poll cadence for endpoint and commit waits.
    pub poll: PollPolicy,
    /// Delete the `.bin` payload after the attempt.
    pub remove_encrypted_payload: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            remove_encrypted_payload: true,
        }
    }
}

/// Identifiers created so far during a run.
#[derive(Debug, Default)]
struct RunProgress {
    /// Encrypted payload path once written.
    payload: Option<PathBuf>,
    /// Content version once created.
    version: Option<ContentVersionId>,
    /// Content file once registered.
    file: Option<ContentFileId>,
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Encrypted app content upload pipeline.
///
/// The pipeline holds no per-run state; one instance may serve concurrent
/// runs for different apps.
pub struct ContentUploadPipeline {
    /// Backend client.
    backend: Arc<dyn ContentBackend>,
    /// Storage client.
    blob_store: Arc<dyn BlobStore>,
    /// Installer source resolver.
    resolver: SourceResolver,
    /// Payload encryptor.
    encryptor: ContentEncryptor,
    /// Audit sink.
    audit: Arc<dyn UploadAuditSink>,
    /// Tunables.
    settings: PipelineSettings,
}

impl ContentUploadPipeline {
    /// Creates a pipeline with default settings and a no-op audit sink.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ContentBackend>,
        blob_store: Arc<dyn BlobStore>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            backend,
            blob_store,
            resolver: SourceResolver::new(downloader),
            encryptor: ContentEncryptor::default(),
            audit: Arc::new(NoopAuditSink),
            settings: PipelineSettings::default(),
        }
    }

    /// Builds a pipeline from configuration using the HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineBuildError`] when a client or the audit sink cannot
    /// be created.
    pub fn from_config(config: &AppContentConfig) -> Result<Self, PipelineBuildError> {
        let graph = GraphSettings::from_config(&config.backend)
            .map_err(|err| PipelineBuildError::Backend(err.to_string()))?;
        let backend = GraphContentBackend::new(graph)
            .map_err(|err| PipelineBuildError::Backend(err.to_string()))?;
        let store =
            AzureBlobStore::new(config.upload.block_size_bytes, config.backend.request_timeout())
                .map_err(|err| PipelineBuildError::Storage(err.to_string()))?;
        let downloader = HttpDownloader::new(HttpDownloaderSettings {
            max_bytes: config.download.max_bytes,
            allow_http: config.download.allow_http,
            max_redirects: config.download.max_redirects,
        })
        .map_err(|err| PipelineBuildError::Download(err.to_string()))?;
        let audit: Arc<dyn UploadAuditSink> = match config.audit.sink {
            AuditSinkKind::Stderr => Arc::new(StderrAuditSink),
            AuditSinkKind::None => Arc::new(NoopAuditSink),
            AuditSinkKind::File => {
                let path = config.audit.path.as_deref().ok_or_else(|| {
                    PipelineBuildError::Audit("audit.path is required for the file sink".into())
                })?;
                let sink = FileAuditSink::new(Path::new(path))
                    .map_err(|err| PipelineBuildError::Audit(err.to_string()))?;
                Arc::new(sink)
            }
        };
        Ok(Self::new(Arc::new(backend), Arc::new(store), Arc::new(downloader))
            .with_audit(audit)
            .with_settings(PipelineSettings {
                poll: config.poll.policy(),
                remove_encrypted_payload: config.upload.remove_encrypted_payload,
            }))
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn UploadAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Replaces the tunables.
    #[must_use]
    pub const fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the encryptor.
    #[must_use]
    pub const fn with_encryptor(mut self, encryptor: ContentEncryptor) -> Self {
        self.encryptor = encryptor;
        self
    }

    /// Places download directories under `root`.
    #[must_use]
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resolver = self.resolver.with_temp_root(root);
        self
    }

    /// Runs one upload bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the first [`UploadError`] raised by any step.
    pub fn run(
        &self,
        spec: &SourceSpec,
        app_id: &AppId,
        timeout: Duration,
    ) -> Result<UploadOutcome, UploadError> {
        self.run_with_deadline(spec, app_id, &Deadline::after(timeout))
    }

    /// Runs one upload bounded by a caller-supplied deadline.
    ///
    /// # Errors
    ///
    /// Returns the first [`UploadError`] raised by any step.
    pub fn run_with_deadline(
        &self,
        spec: &SourceSpec,
        app_id: &AppId,
        deadline: &Deadline,
    ) -> Result<UploadOutcome, UploadError> {
        let mut source = match self.resolver.resolve(spec, deadline) {
            Ok(Some(source)) => source,
            Ok(None) => return Ok(UploadOutcome::NothingToUpload),
            Err(err) => {
                self.record_failure(app_id, &err, &RunProgress::default());
                return Err(err);
            }
        };
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::SourceResolved, app_id)
                .phase(UploadPhase::ResolveSource)
                .ok(true)
                .detail(if source.is_temporary() { "downloaded" } else { "local" }),
        );

        let mut progress = RunProgress::default();
        let result = self.execute(&source, app_id, deadline, &mut progress);
        self.cleanup(app_id, &mut source, progress.payload.as_deref());

        match result {
            Ok(receipt) => {
                self.audit.record(
                    &UploadAuditEvent::new(UploadEventKind::PipelineSucceeded, app_id)
                        .version(&receipt.content_version_id)
                        .file_id(&receipt.content_file_id)
                        .state(receipt.upload_state.as_ref())
                        .bytes(receipt.size_encrypted)
                        .ok(true),
                );
                Ok(UploadOutcome::Committed(receipt))
            }
            Err(err) => {
                self.record_failure(app_id, &err, &progress);
                Err(err)
            }
        }
    }

    /// Runs every step after source resolution.
    fn execute(
        &self,
        source: &InstallerSource,
        app_id: &AppId,
        deadline: &Deadline,
        progress: &mut RunProgress,
    ) -> Result<UploadReceipt, UploadError> {
        ensure_budget(UploadPhase::Encrypt, deadline)?;
        let (payload, metadata) = self.encryptor.encrypt(source.path())?;
        progress.payload = Some(payload.path.clone());
        self.audit.record(
            &UploadAuditEvent::new(UploadEventKind::PayloadEncrypted, app_id)
                .phase(UploadPhase::Encrypt)
                .bytes(payload.encrypted_size)
                .ok(true),
        );

        let registrar = ContentVersionRegistrar::new(self.backend.clone(), self.audit.clone());
        let version = registrar.create_version(app_id, deadline)?;
        progress.version = Some(version.content_version_id.clone());
        let (file, _) =
            registrar.register_file(&version, &source.file_name(), &payload, deadline)?;
        progress.file = Some(file.content_file_id.clone());

        let endpoint =
            UploadEndpointWaiter::new(self.backend.clone(), self.settings.poll, self.audit.clone())
                .wait(&file, deadline)?;
        let transfer = BlobUploader::new(self.blob_store.clone(), self.audit.clone())
            .upload(&file, &endpoint, &payload, deadline)?;

        CommitCoordinator::new(self.backend.clone(), self.settings.poll, self.audit.clone())
            .commit(&file, &metadata.to_wire(), deadline)?;
        VersionPublisher::new(self.backend.clone(), self.audit.clone())
            .publish(&version, deadline)?;

        ensure_budget(UploadPhase::Finalize, deadline)?;
        let record = self
            .backend
            .get_content_file(&file, deadline)
            .map_err(|err| backend_failure(UploadPhase::Finalize, err, deadline))?;

        Ok(UploadReceipt {
            app_id: app_id.clone(),
            content_version_id: version.content_version_id,
            content_file_id: file.content_file_id,
            upload_state: record.upload_state,
            is_committed: record.is_committed,
            size: payload.original_size,
            size_encrypted: payload.encrypted_size,
            blocks: transfer.blocks,
            file_digest: metadata.digest_base64(),
            file_digest_algorithm: metadata.file_digest_algorithm.clone(),
            elapsed_ms: u64::try_from(deadline.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Removes local artifacts; failures are audited, never raised.
    fn cleanup(&self, app_id: &AppId, source: &mut InstallerSource, payload: Option<&Path>) {
        if self.settings.remove_encrypted_payload
            && let Some(path) = payload
        {
            let event = UploadAuditEvent::new(UploadEventKind::Cleanup, app_id);
            let event = match fs::remove_file(path) {
                Ok(()) => event.ok(true).detail("encrypted payload removed"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    event.ok(true).detail("encrypted payload already absent")
                }
                Err(err) => event.ok(false).detail(format!("encrypted payload not removed: {err}")),
            };
            self.audit.record(&event);
        }
        if source.is_temporary() {
            let event = UploadAuditEvent::new(UploadEventKind::Cleanup, app_id);
            let event = match source.release() {
                Ok(true) => event.ok(true).detail("temporary source removed"),
                Ok(false) => event.ok(true).detail("temporary source already absent"),
                Err(err) => event.ok(false).detail(format!("temporary source not removed: {err}")),
            };
            self.audit.record(&event);
        }
    }

    /// Emits `pipeline_failed` with whatever identifiers were created.
    fn record_failure(&self, app_id: &AppId, err: &UploadError, progress: &RunProgress) {
        let mut event = UploadAuditEvent::new(UploadEventKind::PipelineFailed, app_id)
            .phase(err.phase())
            .ok(false)
            .detail(err.to_string());
        if let Some(version) = &progress.version {
            event = event.version(version);
        }
        if let Some(file) = &progress.file {
            event = event.file_id(file);
        }
        self.audit.record(&event);
    }
}
