// crates/appcontent-pipeline/src/lib.rs
// ============================================================================
// Module: App Content Pipeline Library
// Description: Encrypted installer upload pipeline and its HTTP clients.
// Purpose: Expose the pipeline stages, orchestrator, and concrete backends.
// Dependencies: crate::{audit, blob, commit, encrypt, error, graph, pipeline, ...}
// ============================================================================

//! ## Overview
//! The pipeline turns an installer (local path or URL) into a committed,
//! published content version: encrypt, register, await endpoint, transfer,
//! commit, publish. Stages are usable on their own; [`ContentUploadPipeline`]
//! runs them in order under one deadline and cleans up local artifacts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod blob;
pub mod commit;
pub mod encrypt;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod publish;
pub mod registrar;
pub mod source;
pub mod transfer;
pub mod waiter;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::UploadAuditEvent;
pub use audit::UploadAuditSink;
pub use audit::UploadEventKind;
pub use blob::AzureBlobStore;
pub use commit::CommitCoordinator;
pub use encrypt::ContentEncryptor;
pub use encrypt::EncryptError;
pub use error::CommitStage;
pub use error::PipelineBuildError;
pub use error::UploadError;
pub use error::UploadPhase;
pub use graph::GraphContentBackend;
pub use graph::GraphSettings;
pub use pipeline::ContentUploadPipeline;
pub use pipeline::PipelineSettings;
pub use pipeline::UploadOutcome;
pub use pipeline::UploadReceipt;
pub use publish::VersionPublisher;
pub use registrar::ContentVersionRegistrar;
pub use source::DownloadError;
pub use source::Downloader;
pub use source::HttpDownloader;
pub use source::HttpDownloaderSettings;
pub use source::InstallerSource;
pub use source::SourceResolver;
pub use source::SourceSpec;
pub use source::SourceValue;
pub use transfer::BlobUploader;
pub use waiter::UploadEndpointWaiter;
