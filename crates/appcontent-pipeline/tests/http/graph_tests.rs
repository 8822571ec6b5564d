// crates/appcontent-pipeline/tests/http/graph_tests.rs
// ============================================================================
// Module: Graph Backend Tests
// Description: Request shapes and error mapping of the content backend client.
// Purpose: Validate paths, bodies, auth, and status classification over HTTP.
// Dependencies: appcontent-core, appcontent-pipeline, serde_json, tiny_http
// ============================================================================

//! ## Overview
//! Exercises [`appcontent_pipeline::GraphContentBackend`] against a local
//! server that scripts one response per request.

use std::time::Duration;

use appcontent_core::AppId;
use appcontent_core::BackendError;
use appcontent_core::ContentBackend;
use appcontent_core::ContentFileId;
use appcontent_core::ContentFileSpec;
use appcontent_core::ContentVersionId;
use appcontent_core::ContentVersionRef;
use appcontent_core::Deadline;
use appcontent_core::FileEncryptionInfo;
use appcontent_core::UploadState;
use appcontent_pipeline::GraphContentBackend;
use appcontent_pipeline::GraphSettings;
use serde_json::json;
use zeroize::Zeroizing;

use super::common::serve;

const APP_TYPE: &str = "microsoft.graph.win32LobApp";
const APP_PATH: &str = "/beta/deviceAppManagement/mobileApps/app-1/microsoft.graph.win32LobApp";

fn backend(base: &str) -> GraphContentBackend {
    GraphContentBackend::new(GraphSettings {
        base_url: format!("{base}/beta"),
        app_type: APP_TYPE.to_string(),
        token: Zeroizing::new("test-token".to_string()),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(30))
}

fn version() -> ContentVersionRef {
    ContentVersionRef::new(AppId::new("app-1"), ContentVersionId::new("7"))
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Tests version creation posts an empty object with the bearer token.
#[test]
fn create_version_posts_to_content_versions() {
    let (base, handle) = serve(vec![(201, json!({"id": "7"}).to_string())]);
    let created = backend(&base).create_content_version(&AppId::new("app-1"), &deadline()).unwrap();
    let requests = handle.join().unwrap();

    assert_eq!(created.id.as_str(), "7");
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, format!("{APP_PATH}/contentVersions"));
    assert_eq!(requests[0].header("Authorization"), Some("Bearer test-token"));
    assert_eq!(requests[0].json(), json!({}));
}

/// Tests file registration carries the OData type and camel-case sizes.
#[test]
fn create_file_sends_sizes_and_odata_type() {
    let (base, handle) = serve(vec![(
        201,
        json!({"id": "f-1", "uploadState": "azureStorageUriRequestPending"}).to_string(),
    )]);
    let spec = ContentFileSpec {
        name: "setup.msi".to_string(),
        size: 10,
        size_encrypted: 64,
        is_dependency: false,
    };
    let record = backend(&base).create_content_file(&version(), &spec, &deadline()).unwrap();
    let requests = handle.join().unwrap();

    assert_eq!(record.id.as_str(), "f-1");
    assert_eq!(record.upload_state, Some(UploadState::Pending));
    assert_eq!(requests[0].url, format!("{APP_PATH}/contentVersions/7/files"));
    assert_eq!(
        requests[0].json(),
        json!({
            "@odata.type": "#microsoft.graph.mobileAppContentFile",
            "name": "setup.msi",
            "size": 10,
            "sizeEncrypted": 64,
            "isDependency": false
        })
    );
}

/// Tests the file read decodes the endpoint and tolerates unknown fields.
#[test]
fn get_file_decodes_storage_uri() {
    let (base, handle) = serve(vec![(
        200,
        json!({
            "id": "f-1",
            "uploadState": "azureStorageUriRequestSuccess",
            "azureStorageUri": "https://acct.blob.core.windows.net/c/b?sig=abc",
            "azureStorageUriExpirationDateTime": "2026-10-16T12:00:00Z",
            "isCommitted": false,
            "manifest": null
        })
        .to_string(),
    )]);
    let file = version().file(ContentFileId::new("f-1"));
    let record = backend(&base).get_content_file(&file, &deadline()).unwrap();
    let requests = handle.join().unwrap();

    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, format!("{APP_PATH}/contentVersions/7/files/f-1"));
    assert_eq!(record.upload_state, Some(UploadState::AzureStorageUriRequestSuccess));
    assert_eq!(record.is_committed, Some(false));
    let endpoint = record.storage_endpoint().unwrap();
    assert!(!endpoint.redacted().contains("sig"));
}

/// Tests commit wraps the encryption info under `fileEncryptionInfo`.
#[test]
fn commit_posts_file_encryption_info() {
    let (base, handle) = serve(vec![(200, String::new())]);
    let info = FileEncryptionInfo {
        encryption_key: "a2V5".to_string(),
        mac_key: "bWFj".to_string(),
        mac: "bWFjdmFs".to_string(),
        initialization_vector: "aXY=".to_string(),
        file_digest: "ZGlnZXN0".to_string(),
        file_digest_algorithm: "SHA256".to_string(),
        profile_identifier: "ProfileVersion1".to_string(),
    };
    let file = version().file(ContentFileId::new("f-1"));
    backend(&base).commit_content_file(&file, &info, &deadline()).unwrap();
    let requests = handle.join().unwrap();

    assert_eq!(requests[0].url, format!("{APP_PATH}/contentVersions/7/files/f-1/commit"));
    assert_eq!(
        requests[0].json(),
        json!({
            "fileEncryptionInfo": {
                "encryptionKey": "a2V5",
                "macKey": "bWFj",
                "mac": "bWFjdmFs",
                "initializationVector": "aXY=",
                "fileDigest": "ZGlnZXN0",
                "fileDigestAlgorithm": "SHA256",
                "profileIdentifier": "ProfileVersion1"
            }
        })
    );
}

/// Tests publishing patches the app with its OData type and the version id.
#[test]
fn publish_patches_committed_content_version() {
    let (base, handle) = serve(vec![(204, String::new())]);
    backend(&base)
        .set_committed_content_version(
            &AppId::new("app-1"),
            &ContentVersionId::new("7"),
            &deadline(),
        )
        .unwrap();
    let requests = handle.join().unwrap();

    assert_eq!(requests[0].method, "PATCH");
    assert_eq!(requests[0].url, "/beta/deviceAppManagement/mobileApps/app-1");
    assert_eq!(
        requests[0].json(),
        json!({
            "@odata.type": "#microsoft.graph.win32LobApp",
            "committedContentVersion": "7"
        })
    );
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tests the backend error envelope is folded into the status error.
#[test]
fn error_envelope_is_surfaced_with_status() {
    let body = json!({"error": {"code": "Forbidden", "message": "Insufficient privileges"}});
    let (base, handle) = serve(vec![(403, body.to_string())]);
    let err = backend(&base).create_content_version(&AppId::new("app-1"), &deadline()).unwrap_err();
    handle.join().unwrap();

    assert_eq!(
        err,
        BackendError::Status {
            status: 403,
            message: "Forbidden: Insufficient privileges".to_string(),
        }
    );
    assert!(err.is_access_failure());
    assert!(!err.is_retryable());
}

/// Tests throttling and server errors classify as retryable.
#[test]
fn throttling_and_server_errors_are_retryable() {
    let (base, handle) = serve(vec![(429, String::new()), (502, String::new())]);
    let backend = backend(&base);
    let file = version().file(ContentFileId::new("f-1"));
    let first = backend.get_content_file(&file, &deadline()).unwrap_err();
    let second = backend.get_content_file(&file, &deadline()).unwrap_err();
    handle.join().unwrap();

    assert_eq!(first.status(), Some(429));
    assert!(first.is_retryable());
    assert_eq!(second.status(), Some(502));
    assert!(second.is_retryable());
}

/// Tests a malformed success body is a fatal decode error.
#[test]
fn malformed_body_is_a_decode_error() {
    let (base, handle) = serve(vec![(200, "not json".to_string())]);
    let err = backend(&base).create_content_version(&AppId::new("app-1"), &deadline()).unwrap_err();
    handle.join().unwrap();

    assert!(matches!(err, BackendError::Decode(_)));
    assert!(!err.is_retryable());
}

/// Tests an exhausted deadline skips the request entirely.
#[test]
fn exhausted_deadline_skips_request() {
    let backend = backend("http://127.0.0.1:9");
    let err = backend
        .create_content_version(&AppId::new("app-1"), &Deadline::after(Duration::ZERO))
        .unwrap_err();
    assert_eq!(err, BackendError::DeadlineExhausted);
}
