// crates/appcontent-pipeline/tests/pipeline/commit_tests.rs
// ============================================================================
// Module: Commit Tests
// Description: Commit submission retries and commit processing outcomes.
// Purpose: Validate submit/await classification inside full pipeline runs.
// Dependencies: appcontent-core, appcontent-pipeline, tempfile
// ============================================================================

//! ## Overview
//! Scripts the commit endpoint and the post-commit reads to cover retries,
//! fatal rejections, backend-reported failure, and both timeout stages.

use std::time::Duration;

use appcontent_core::Exhaustion;
use appcontent_core::UploadState;
use appcontent_pipeline::CommitStage;
use appcontent_pipeline::SourceSpec;
use appcontent_pipeline::UploadError;
use appcontent_pipeline::UploadOutcome;
use appcontent_pipeline::UploadPhase;

use super::common::Harness;
use super::common::ScriptedBackend;
use super::common::app;
use super::common::commit_pending;
use super::common::committed;
use super::common::installer;
use super::common::record;
use super::common::status;
use super::common::uri_ready;

/// Runs the harness against a fresh local installer.
fn run(harness: &Harness, timeout: Duration) -> Result<UploadOutcome, UploadError> {
    let dir = tempfile::tempdir().unwrap();
    let source = installer(dir.path(), "installer.msi", b"0123456789");
    harness.pipeline.run_with_deadline(
        &SourceSpec::from_file(source.display().to_string()),
        &app(),
        &harness.deadline(timeout),
    )
}

// ============================================================================
// SECTION: Submit
// ============================================================================

/// Tests conflicts and server errors on submit are retried until accepted.
#[test]
fn submit_retries_conflicts_until_accepted() {
    let harness = Harness::new(ScriptedBackend::new(
        vec![uri_ready(), committed()],
        vec![Err(status(409)), Err(status(503)), Ok(())],
    ));
    let outcome = run(&harness, Duration::from_secs(1800)).unwrap();

    assert!(matches!(outcome, UploadOutcome::Committed(_)));
    assert_eq!(harness.backend.count("commit"), 3);
    assert_eq!(harness.backend.count("publish"), 1);
}

/// Tests a forbidden submit is not retried.
#[test]
fn submit_forbidden_is_fatal() {
    let harness =
        Harness::new(ScriptedBackend::new(vec![uri_ready()], vec![Err(status(403))]));
    let err = run(&harness, Duration::from_secs(1800)).unwrap_err();

    assert_eq!(err.phase(), UploadPhase::CommitSubmit);
    assert!(err.is_backend_rejection());
    assert_eq!(harness.backend.count("commit"), 1);
    assert_eq!(harness.backend.count("publish"), 0);
}

/// Tests a submit that is never accepted times out in the submit stage.
#[test]
fn submit_never_accepted_times_out() {
    let harness =
        Harness::new(ScriptedBackend::new(vec![uri_ready()], vec![Err(status(409))]));
    let err = run(&harness, Duration::from_secs(90)).unwrap_err();

    let UploadError::CommitTimeout {
        stage,
        reason,
        last_observed,
        ..
    } = &err
    else {
        panic!("expected commit timeout, got {err:?}");
    };
    assert_eq!(*stage, CommitStage::Submit);
    assert_eq!(*reason, Exhaustion::Expired);
    assert!(last_observed.as_deref().unwrap_or_default().contains("409"));
    assert!(err.is_timeout());
    assert!(harness.backend.count("commit") > 1);
}

// ============================================================================
// SECTION: Await
// ============================================================================

/// Tests a backend-reported commit failure is fatal and distinct from a timeout.
#[test]
fn commit_failed_after_pending_is_fatal() {
    let harness = Harness::new(ScriptedBackend::new(
        vec![
            uri_ready(),
            commit_pending(),
            commit_pending(),
            Ok(record(Some(UploadState::CommitFileFailed), None)),
        ],
        vec![Ok(())],
    ));
    let err = run(&harness, Duration::from_secs(1800)).unwrap_err();

    let UploadError::CommitFailed {
        state,
    } = &err
    else {
        panic!("expected commit failure, got {err:?}");
    };
    assert_eq!(*state, UploadState::CommitFileFailed);
    assert_eq!(err.phase(), UploadPhase::CommitAwait);
    assert!(!err.is_timeout());
    assert_eq!(harness.backend.count("publish"), 0);
}

/// Tests a commit that never finishes processing times out in the await stage.
#[test]
fn commit_never_processed_times_out() {
    let harness =
        Harness::new(ScriptedBackend::new(vec![uri_ready(), commit_pending()], vec![Ok(())]));
    let err = run(&harness, Duration::from_secs(90)).unwrap_err();

    let UploadError::CommitTimeout {
        stage,
        last_observed,
        ..
    } = &err
    else {
        panic!("expected commit timeout, got {err:?}");
    };
    assert_eq!(*stage, CommitStage::Await);
    assert_eq!(last_observed.as_deref(), Some("commitFilePending"));
    assert_eq!(err.phase(), UploadPhase::CommitAwait);
    assert!(err.to_string().starts_with("commit_await: timed out"));
}

/// Tests a transient read error during commit processing is retried.
#[test]
fn commit_await_retries_transient_reads() {
    let harness = Harness::new(ScriptedBackend::new(
        vec![uri_ready(), Err(status(429)), commit_pending(), committed()],
        vec![Ok(())],
    ));
    let outcome = run(&harness, Duration::from_secs(1800)).unwrap();
    let UploadOutcome::Committed(receipt) = outcome else {
        panic!("expected a committed upload");
    };
    assert_eq!(receipt.upload_state, Some(UploadState::CommitFileSuccess));
}
