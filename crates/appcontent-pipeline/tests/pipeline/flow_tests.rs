// crates/appcontent-pipeline/tests/pipeline/flow_tests.rs
// ============================================================================
// Module: Pipeline Flow Tests
// Description: End-to-end runs over local and downloaded installers.
// Purpose: Validate step order, receipts, cleanup, and source handling.
// Dependencies: appcontent-core, appcontent-pipeline, base64, sha2, tempfile
// ============================================================================

//! ## Overview
//! Drives [`appcontent_pipeline::ContentUploadPipeline`] through complete
//! runs and asserts on backend calls, transferred bytes, and local files.

use std::time::Duration;

use appcontent_core::BlobError;
use appcontent_core::UploadState;
use appcontent_pipeline::SourceSpec;
use appcontent_pipeline::SourceValue;
use appcontent_pipeline::UploadError;
use appcontent_pipeline::UploadEventKind;
use appcontent_pipeline::UploadOutcome;
use appcontent_pipeline::UploadPhase;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::Digest;
use sha2::Sha256;

use super::common::Harness;
use super::common::RecordingBlobStore;
use super::common::SAS_URI;
use super::common::ScriptedBackend;
use super::common::StaticDownloader;
use super::common::app;
use super::common::installer;
use super::common::status;

const TIMEOUT: Duration = Duration::from_secs(1800);

// ============================================================================
// SECTION: Local Source
// ============================================================================

/// Tests a 10-byte local installer runs every step and leaves only the plaintext.
#[test]
fn local_installer_is_encrypted_uploaded_committed_and_published() {
    let dir = tempfile::tempdir().unwrap();
    let source = installer(dir.path(), "installer.msi", b"0123456789");
    let harness = Harness::new(ScriptedBackend::happy());

    let outcome = harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_file(source.display().to_string()),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap();

    let UploadOutcome::Committed(receipt) = outcome else {
        panic!("expected a committed upload");
    };
    assert_eq!(receipt.content_version_id.as_str(), "1");
    assert_eq!(receipt.content_file_id.as_str(), "file-1");
    assert_eq!(receipt.upload_state, Some(UploadState::CommitFileSuccess));
    assert_eq!(receipt.is_committed, Some(true));
    assert_eq!(receipt.size, 10);
    assert_eq!(receipt.size_encrypted, 64);
    assert_eq!(receipt.blocks, 1);
    assert_eq!(receipt.file_digest, STANDARD.encode(Sha256::digest(b"0123456789")));
    assert_eq!(receipt.file_digest_algorithm, "SHA256");

    assert_eq!(
        harness.backend.calls(),
        ["create_version", "create_file", "get", "commit", "get", "get", "publish", "get"]
    );

    let spec = harness.backend.registered().unwrap();
    assert_eq!(spec.name, "installer.msi");
    assert_eq!(spec.size, 10);
    assert_eq!(spec.size_encrypted, 64);
    assert!(!spec.is_dependency);

    let info = harness.backend.commit_info().unwrap();
    assert_eq!(info.profile_identifier, "ProfileVersion1");
    assert_eq!(info.file_digest_algorithm, "SHA256");
    assert_eq!(info.file_digest, receipt.file_digest);
    assert_eq!(STANDARD.decode(&info.encryption_key).unwrap().len(), 32);
    assert_eq!(STANDARD.decode(&info.mac_key).unwrap().len(), 32);
    assert_eq!(STANDARD.decode(&info.initialization_vector).unwrap().len(), 16);

    let uploads = harness.store.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].endpoint, SAS_URI);
    assert_eq!(uploads[0].path.extension().unwrap(), "bin");
    assert_eq!(uploads[0].bytes.len(), 64);
    assert_eq!(&uploads[0].bytes[..32], STANDARD.decode(&info.mac).unwrap().as_slice());

    assert!(source.exists());
    assert!(!uploads[0].path.exists());
}

/// Tests audit events follow the run and never carry the SAS signature.
#[test]
fn audit_trail_is_ordered_and_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let source = installer(dir.path(), "installer.msi", b"0123456789");
    let harness = Harness::new(ScriptedBackend::happy());

    harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_file(source.display().to_string()),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap();

    let kinds = harness.audit.kinds();
    assert_eq!(kinds.first(), Some(&UploadEventKind::SourceResolved));
    assert_eq!(kinds.last(), Some(&UploadEventKind::PipelineSucceeded));
    for expected in [
        UploadEventKind::PayloadEncrypted,
        UploadEventKind::ContentVersionCreated,
        UploadEventKind::ContentFileRegistered,
        UploadEventKind::PollAttempt,
        UploadEventKind::StorageEndpointReady,
        UploadEventKind::BlockUploaded,
        UploadEventKind::BlobCommitted,
        UploadEventKind::CommitSubmitted,
        UploadEventKind::CommitState,
        UploadEventKind::VersionPublished,
        UploadEventKind::Cleanup,
    ] {
        assert!(kinds.contains(&expected), "missing {expected:?}");
    }
    for event in harness.audit.events() {
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains("sig="), "leaked SAS query: {line}");
    }
}

/// Tests a missing local file fails during encryption before any backend call.
#[test]
fn missing_local_file_fails_in_encrypt_without_backend_calls() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(ScriptedBackend::happy());

    let err = harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_file(dir.path().join("absent.msi").display().to_string()),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap_err();

    assert_eq!(err.phase(), UploadPhase::Encrypt);
    assert!(matches!(err, UploadError::Encrypt(_)));
    assert!(harness.backend.calls().is_empty());
    assert!(!dir.path().join("absent.msi.bin").exists());
}

// ============================================================================
// SECTION: Source Resolution
// ============================================================================

/// Tests unknown inputs are a no-op.
#[test]
fn unknown_inputs_report_nothing_to_upload() {
    let harness = Harness::new(ScriptedBackend::happy());
    let outcome = harness
        .pipeline
        .run_with_deadline(&SourceSpec::unknown(), &app(), &harness.deadline(TIMEOUT))
        .unwrap();
    assert_eq!(outcome, UploadOutcome::NothingToUpload);
    assert!(harness.backend.calls().is_empty());
}

/// Tests empty inputs fail before any backend call.
#[test]
fn empty_inputs_fail_with_no_installer_source() {
    let harness = Harness::new(ScriptedBackend::happy());
    let spec = SourceSpec {
        file_path: SourceValue::known(""),
        url: SourceValue::Null,
    };
    let err =
        harness.pipeline.run_with_deadline(&spec, &app(), &harness.deadline(TIMEOUT)).unwrap_err();
    assert!(matches!(err, UploadError::NoInstallerSource));
    assert_eq!(err.phase(), UploadPhase::ResolveSource);
    assert!(harness.backend.calls().is_empty());
    assert_eq!(harness.audit.kinds(), [UploadEventKind::PipelineFailed]);
}

/// Tests a downloaded installer's temp directory is removed after success.
#[test]
fn downloaded_source_is_removed_after_success() {
    let harness = Harness::new(ScriptedBackend::happy());
    let outcome = harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_url("https://downloads.example.com/setup.msi"),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap();

    let UploadOutcome::Committed(receipt) = outcome else {
        panic!("expected a committed upload");
    };
    assert_eq!(receipt.size, "downloaded installer".len() as u64);
    assert_eq!(harness.backend.registered().unwrap().name, "setup.msi");
    let dirs = harness.downloader.dirs();
    assert_eq!(dirs.len(), 1);
    assert!(dirs[0].file_name().unwrap().to_string_lossy().starts_with("appcontent-"));
    assert!(!dirs[0].exists());
}

/// Tests a downloaded installer's temp directory is removed after a failure.
#[test]
fn downloaded_source_is_removed_after_failure() {
    let harness = Harness::new(ScriptedBackend::happy().fail_create_version(status(500)));
    let err = harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_url("https://downloads.example.com/setup.msi"),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap_err();

    assert_eq!(err.phase(), UploadPhase::Register);
    assert!(err.is_backend_rejection());
    let dirs = harness.downloader.dirs();
    assert!(!dirs[0].exists());
    assert!(!dirs[0].join("setup.msi.bin").exists());
}

/// Tests a failed download surfaces the redacted URL and touches nothing else.
#[test]
fn failed_download_carries_redacted_url() {
    let harness = Harness::with_parts(
        ScriptedBackend::happy(),
        RecordingBlobStore::default(),
        StaticDownloader::failing(),
    );
    let err = harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_url("https://downloads.example.com/setup.msi?token=hunter2"),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap_err();

    let UploadError::Download {
        url, ..
    } = &err
    else {
        panic!("expected download failure, got {err:?}");
    };
    assert_eq!(url, "https://downloads.example.com/setup.msi");
    assert!(!err.to_string().contains("hunter2"));
    assert!(harness.backend.calls().is_empty());
    assert!(!harness.downloader.dirs()[0].exists());
}

// ============================================================================
// SECTION: Late Failures
// ============================================================================

/// Tests a storage failure aborts before commit and still removes the payload.
#[test]
fn transfer_failure_skips_commit_and_removes_payload() {
    let dir = tempfile::tempdir().unwrap();
    let source = installer(dir.path(), "installer.msi", b"0123456789");
    let harness = Harness::with_parts(
        ScriptedBackend::happy(),
        RecordingBlobStore::failing(BlobError::Status {
            operation: "put_block",
            status: 403,
        }),
        StaticDownloader::serving("unused", b""),
    );

    let err = harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_file(source.display().to_string()),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap_err();

    assert_eq!(err.phase(), UploadPhase::Transfer);
    assert!(matches!(err, UploadError::Transfer(_)));
    assert_eq!(harness.backend.count("commit"), 0);
    assert!(!dir.path().join("installer.msi.bin").exists());
    assert!(source.exists());

    let failed = harness
        .audit
        .events()
        .into_iter()
        .find(|event| event.event == UploadEventKind::PipelineFailed)
        .unwrap();
    assert_eq!(failed.content_version_id.as_deref(), Some("1"));
    assert_eq!(failed.content_file_id.as_deref(), Some("file-1"));
    assert_eq!(failed.phase, Some(UploadPhase::Transfer));
}

/// Tests a publish rejection is reported as a publish-phase backend error.
#[test]
fn publish_rejection_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let source = installer(dir.path(), "installer.msi", b"0123456789");
    let harness = Harness::new(ScriptedBackend::happy().fail_publish(status(403)));

    let err = harness
        .pipeline
        .run_with_deadline(
            &SourceSpec::from_file(source.display().to_string()),
            &app(),
            &harness.deadline(TIMEOUT),
        )
        .unwrap_err();

    assert_eq!(err.phase(), UploadPhase::Publish);
    assert!(err.is_backend_rejection());
    assert!(!err.is_timeout());
    assert_eq!(harness.backend.count("publish"), 1);
}
