// crates/appcontent-pipeline/tests/pipeline/wait_tests.rs
// ============================================================================
// Module: Storage Endpoint Wait Tests
// Description: Polling, timeout, and cancellation behavior of the endpoint wait.
// Purpose: Keep timeouts, rejections, and protocol violations distinguishable.
// Dependencies: appcontent-core, appcontent-pipeline, tempfile
// ============================================================================

//! ## Overview
//! Every scenario runs on the harness's virtual clock, so budgets of minutes
//! complete instantly and elapsed time can be asserted exactly.

use std::time::Duration;

use appcontent_core::BackendError;
use appcontent_core::CancellationToken;
use appcontent_core::Exhaustion;
use appcontent_core::UploadState;
use appcontent_pipeline::SourceSpec;
use appcontent_pipeline::UploadError;
use appcontent_pipeline::UploadOutcome;
use appcontent_pipeline::UploadPhase;

use super::common::Harness;
use super::common::MAX_POLL_INTERVAL;
use super::common::ScriptedBackend;
use super::common::app;
use super::common::commit_pending;
use super::common::committed;
use super::common::installer;
use super::common::pending;
use super::common::record;
use super::common::status;
use super::common::uri_ready;

/// Runs the harness against a fresh 10-byte local installer.
fn run(harness: &Harness, timeout: Duration) -> Result<UploadOutcome, UploadError> {
    let dir = tempfile::tempdir().unwrap();
    let source = installer(dir.path(), "installer.msi", b"0123456789");
    let outcome = harness.pipeline.run_with_deadline(
        &SourceSpec::from_file(source.display().to_string()),
        &app(),
        &harness.deadline(timeout),
    );
    assert!(!dir.path().join("installer.msi.bin").exists());
    outcome
}

// ============================================================================
// SECTION: Terminal States
// ============================================================================

/// Tests a refused endpoint request stops on the first read.
#[test]
fn endpoint_failure_stops_immediately() {
    let harness = Harness::new(ScriptedBackend::new(
        vec![Ok(record(Some(UploadState::AzureStorageUriRequestFailed), None))],
        vec![Ok(())],
    ));
    let err = run(&harness, Duration::from_secs(1800)).unwrap_err();

    assert!(matches!(err, UploadError::UploadEndpointFailed { .. }));
    assert!(err.is_backend_rejection());
    assert!(!err.is_timeout());
    assert_eq!(harness.backend.count("get"), 1);
    assert_eq!(harness.clock.elapsed(), Duration::ZERO);
    assert!(harness.store.uploads().is_empty());
}

/// Tests success without a URI gets one follow-up read and then fails.
#[test]
fn success_without_uri_is_a_protocol_violation() {
    let harness = Harness::new(ScriptedBackend::new(
        vec![Ok(record(Some(UploadState::AzureStorageUriRequestSuccess), None))],
        vec![Ok(())],
    ));
    let err = run(&harness, Duration::from_secs(1800)).unwrap_err();

    assert!(matches!(err, UploadError::MissingStorageUri));
    assert_eq!(err.phase(), UploadPhase::AwaitEndpoint);
    assert!(!err.is_timeout());
    assert_eq!(harness.backend.count("get"), 2);
}

/// Tests the follow-up read supplies a URI missing from the success record.
#[test]
fn follow_up_read_supplies_missing_uri() {
    let harness = Harness::new(ScriptedBackend::new(
        vec![
            Ok(record(Some(UploadState::AzureStorageUriRequestSuccess), None)),
            uri_ready(),
            committed(),
        ],
        vec![Ok(())],
    ));
    let outcome = run(&harness, Duration::from_secs(1800)).unwrap();
    assert!(matches!(outcome, UploadOutcome::Committed(_)));
    assert_eq!(harness.store.uploads().len(), 1);
}

// ============================================================================
// SECTION: Polling
// ============================================================================

/// Tests unset, unknown and retryable errors keep polling until the URI appears.
#[test]
fn transient_reads_keep_polling() {
    let harness = Harness::new(ScriptedBackend::new(
        vec![
            Ok(record(None, None)),
            Err(status(503)),
            Err(BackendError::Transport("connection reset".to_string())),
            Ok(record(Some(UploadState::Other("azureStorageUriRequestQueued".into())), None)),
            pending(),
            uri_ready(),
            committed(),
        ],
        vec![Ok(())],
    ));
    let outcome = run(&harness, Duration::from_secs(1800)).unwrap();
    assert!(matches!(outcome, UploadOutcome::Committed(_)));
    assert!(harness.clock.elapsed() >= Duration::from_secs(5));
}

/// Tests an authorization failure while polling stops immediately.
#[test]
fn fatal_read_error_stops_polling() {
    let harness = Harness::new(ScriptedBackend::new(vec![Err(status(401))], vec![Ok(())]));
    let err = run(&harness, Duration::from_secs(1800)).unwrap_err();

    let UploadError::Backend {
        phase,
        source,
    } = &err
    else {
        panic!("expected backend error, got {err:?}");
    };
    assert_eq!(*phase, UploadPhase::AwaitEndpoint);
    assert_eq!(source.status(), Some(401));
    assert_eq!(harness.backend.count("get"), 1);
}

/// Tests a state that never leaves pending times out within one max interval.
#[test]
fn endless_pending_times_out_within_budget() {
    let timeout = Duration::from_secs(120);
    let harness = Harness::new(ScriptedBackend::new(vec![pending()], vec![Ok(())]));
    let err = run(&harness, timeout).unwrap_err();

    let UploadError::UploadEndpointTimeout {
        attempts,
        reason,
        last_observed,
    } = &err
    else {
        panic!("expected endpoint timeout, got {err:?}");
    };
    assert!(*attempts > 1);
    assert_eq!(*reason, Exhaustion::Expired);
    assert_eq!(last_observed.as_deref(), Some("pending"));
    assert!(err.is_timeout());
    assert!(!err.is_backend_rejection());

    let elapsed = harness.clock.elapsed();
    assert!(elapsed >= timeout);
    assert!(elapsed <= timeout + MAX_POLL_INTERVAL);
    assert!(harness.store.uploads().is_empty());
    assert_eq!(harness.backend.count("commit"), 0);
}

/// Tests the poll interval backs off and never exceeds the configured ceiling.
#[test]
fn poll_attempts_back_off_to_the_ceiling() {
    let timeout = Duration::from_secs(60);
    let harness = Harness::new(ScriptedBackend::new(vec![pending()], vec![Ok(())]));
    let _ = run(&harness, timeout).unwrap_err();

    let reads = harness.backend.count("get");
    // Intervals grow 1 s, 1.5 s, 2.25 s, ... and cap at 10 s.
    assert!(reads > 6);
    assert!(reads < 60);
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Tests cancellation ends the wait and is reported distinctly from expiry.
#[test]
fn cancellation_is_not_a_timeout() {
    let token = CancellationToken::new();
    let harness = Harness::new(
        ScriptedBackend::new(vec![pending()], vec![Ok(())]).cancel_after_gets(3, token.clone()),
    );
    let dir = tempfile::tempdir().unwrap();
    let source = installer(dir.path(), "installer.msi", b"0123456789");
    let deadline = harness.deadline(Duration::from_secs(1800)).with_cancellation(token);

    let err = harness
        .pipeline
        .run_with_deadline(&SourceSpec::from_file(source.display().to_string()), &app(), &deadline)
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(!err.is_timeout());
    assert_eq!(harness.backend.count("get"), 3);
    assert!(!dir.path().join("installer.msi.bin").exists());
}

/// Tests an already-exhausted deadline fails before registration.
#[test]
fn exhausted_budget_fails_before_backend_calls() {
    let harness = Harness::new(ScriptedBackend::new(vec![uri_ready(), commit_pending()], vec![]));
    let err = run(&harness, Duration::ZERO).unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(err.phase(), UploadPhase::Encrypt);
    assert!(harness.backend.calls().is_empty());
}
