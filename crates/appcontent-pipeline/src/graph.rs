// crates/appcontent-pipeline/src/graph.rs
// ============================================================================
// Module: Graph Content Backend
// Description: HTTP client for the managed-app content endpoints.
// Purpose: Implement `ContentBackend` against the device-management REST API.
// Dependencies: appcontent-config, appcontent-core, reqwest, serde, url, zeroize
// ============================================================================

//! ## Overview
//! [`GraphContentBackend`] issues one HTTP request per trait call under
//! `{base_url}/deviceAppManagement/mobileApps/{app}`. Every request carries
//! the bearer token and a timeout of `min(request_timeout, remaining budget)`.
//!
//! Non-success responses become [`BackendError::Status`] with the backend's
//! `{ "error": { "code", "message" } }` payload folded into the message, so the
//! retry classifier sees the raw status while operators see the reason.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::time::Duration;

use appcontent_config::BackendConfig;
use appcontent_core::AppId;
use appcontent_core::BackendError;
use appcontent_core::ContentBackend;
use appcontent_core::ContentFileRecord;
use appcontent_core::ContentFileRef;
use appcontent_core::ContentFileSpec;
use appcontent_core::ContentVersion;
use appcontent_core::ContentVersionId;
use appcontent_core::ContentVersionRef;
use appcontent_core::Deadline;
use appcontent_core::FileEncryptionInfo;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;
use zeroize::Zeroizing;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Collection path under the base URL.
const MOBILE_APPS_PATH: [&str; 2] = ["deviceAppManagement", "mobileApps"];
/// OData type of a content file registration.
const CONTENT_FILE_ODATA_TYPE: &str = "#microsoft.graph.mobileAppContentFile";
/// Longest error body echoed into messages.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Connection settings for [`GraphContentBackend`].
#[derive(Clone)]
pub struct GraphSettings {
    /// API base URL (for example `https://graph.microsoft.com/beta`).
    pub base_url: String,
    /// Managed app type segment (for example `microsoft.graph.win32LobApp`).
    pub app_type: String,
    /// Bearer token.
    pub token: Zeroizing<String>,
    /// Per-request timeout cap.
    pub request_timeout: Duration,
}

impl fmt::Debug for GraphSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSettings")
            .field("base_url", &self.base_url)
            .field("app_type", &self.app_type)
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl GraphSettings {
    /// Builds settings from config, reading the token from `token_env`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Request`] when the token variable is unset or empty.
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let token = env::var(&config.token_env).map_err(|_| {
            BackendError::Request(format!("environment variable {} is not set", config.token_env))
        })?;
        if token.trim().is_empty() {
            return Err(BackendError::Request(format!(
                "environment variable {} is empty",
                config.token_env
            )));
        }
        Ok(Self {
            base_url: config.base_url.clone(),
            app_type: config.app_type.clone(),
            token: Zeroizing::new(token),
            request_timeout: config.request_timeout(),
        })
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Content file registration body.
#[derive(Serialize)]
struct ContentFileRequest<'a> {
    /// OData type discriminator.
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    /// Registered file metadata.
    #[serde(flatten)]
    spec: &'a ContentFileSpec,
}

/// Commit request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitRequest<'a> {
    /// Encryption metadata.
    file_encryption_info: &'a FileEncryptionInfo,
}

/// Publish request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishRequest<'a> {
    /// OData type discriminator of the app.
    #[serde(rename = "@odata.type")]
    odata_type: String,
    /// Version to point the app at.
    committed_content_version: &'a ContentVersionId,
}

/// Backend error envelope.
#[derive(Deserialize)]
struct ErrorEnvelope {
    /// Error details.
    error: ErrorDetail,
}

/// Backend error details.
#[derive(Deserialize)]
struct ErrorDetail {
    /// Machine-readable code.
    #[serde(default)]
    code: Option<String>,
    /// Human-readable message.
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// HTTP implementation of [`ContentBackend`].
#[derive(Debug, Clone)]
pub struct GraphContentBackend {
    /// HTTP client.
    client: Client,
    /// Connection settings.
    settings: GraphSettings,
}

impl GraphContentBackend {
    /// Builds a backend with a default client.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Request`] when the base URL is invalid or the
    /// client cannot be constructed.
    pub fn new(settings: GraphSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(|err| BackendError::Request(err.to_string()))?;
        Self::with_client(client, settings)
    }

    /// Creates a backend with a preconfigured client.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Request`] when the base URL is invalid.
    pub fn with_client(client: Client, settings: GraphSettings) -> Result<Self, BackendError> {
        let backend = Self {
            client,
            settings,
        };
        backend.url(&[])?;
        Ok(backend)
    }

    /// Returns the `@odata.type` value for the configured app type.
    #[must_use]
    pub fn app_odata_type(&self) -> String {
        format!("#{}", self.settings.app_type)
    }

    /// Builds `{base}/deviceAppManagement/mobileApps/{segments...}`.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = Url::parse(&self.settings.base_url)
            .map_err(|err| BackendError::Request(format!("invalid base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| BackendError::Request("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(MOBILE_APPS_PATH)
            .extend(segments);
        Ok(url)
    }

    /// Builds the content versions collection URL for an app.
    fn versions_url(&self, app_id: &AppId, tail: &[&str]) -> Result<Url, BackendError> {
        let mut segments =
            vec![app_id.as_str(), self.settings.app_type.as_str(), "contentVersions"];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    /// Builds a content file URL with optional trailing segments.
    fn file_url(&self, file: &ContentFileRef, tail: &[&str]) -> Result<Url, BackendError> {
        let mut segments = vec![
            file.content_version_id.as_str(),
            "files",
            file.content_file_id.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.versions_url(&file.app_id, &segments)
    }

    /// Sends a request and maps transport and status failures.
    fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        deadline: &Deadline,
    ) -> Result<Response, BackendError> {
        let timeout = deadline
            .request_timeout(self.settings.request_timeout)
            .ok_or(BackendError::DeadlineExhausted)?;
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(self.settings.token.as_str())
            .timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().map_err(|err| {
            if err.is_timeout() && deadline.is_exhausted() {
                BackendError::DeadlineExhausted
            } else {
                BackendError::Transport(err.without_url().to_string())
            }
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason().unwrap_or("error")),
        })
    }

    /// Sends a request and decodes a JSON response.
    fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        deadline: &Deadline,
    ) -> Result<T, BackendError> {
        self.send(method, url, body, deadline)?
            .json::<T>()
            .map_err(|err| BackendError::Decode(err.without_url().to_string()))
    }
}

impl ContentBackend for GraphContentBackend {
    fn create_content_version(
        &self,
        app_id: &AppId,
        deadline: &Deadline,
    ) -> Result<ContentVersion, BackendError> {
        let url = self.versions_url(app_id, &[])?;
        let version: ContentVersion =
            self.send_json(Method::POST, url, Some(&serde_json::json!({})), deadline)?;
        if version.id.is_blank() {
            return Err(BackendError::Decode("content version id is empty".to_string()));
        }
        Ok(version)
    }

    fn create_content_file(
        &self,
        version: &ContentVersionRef,
        spec: &ContentFileSpec,
        deadline: &Deadline,
    ) -> Result<ContentFileRecord, BackendError> {
        let url =
            self.versions_url(&version.app_id, &[version.content_version_id.as_str(), "files"])?;
        let body = ContentFileRequest {
            odata_type: CONTENT_FILE_ODATA_TYPE,
            spec,
        };
        let record: ContentFileRecord = self.send_json(Method::POST, url, Some(&body), deadline)?;
        if record.id.is_blank() {
            return Err(BackendError::Decode("content file id is empty".to_string()));
        }
        Ok(record)
    }

    fn get_content_file(
        &self,
        file: &ContentFileRef,
        deadline: &Deadline,
    ) -> Result<ContentFileRecord, BackendError> {
        let url = self.file_url(file, &[])?;
        self.send_json::<(), _>(Method::GET, url, None, deadline)
    }

    fn commit_content_file(
        &self,
        file: &ContentFileRef,
        info: &FileEncryptionInfo,
        deadline: &Deadline,
    ) -> Result<(), BackendError> {
        let url = self.file_url(file, &["commit"])?;
        let body = CommitRequest {
            file_encryption_info: info,
        };
        self.send(Method::POST, url, Some(&body), deadline).map(|_| ())
    }

    fn set_committed_content_version(
        &self,
        app_id: &AppId,
        version: &ContentVersionId,
        deadline: &Deadline,
    ) -> Result<(), BackendError> {
        let url = self.url(&[app_id.as_str()])?;
        let body = PublishRequest {
            odata_type: self.app_odata_type(),
            committed_content_version: version,
        };
        self.send(Method::PATCH, url, Some(&body), deadline).map(|_| ())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts `code: message` from an error body, falling back to trimmed text.
fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        match (envelope.error.code, envelope.error.message) {
            (Some(code), Some(message)) => return format!("{code}: {message}"),
            (Some(text), None) | (None, Some(text)) => return text,
            (None, None) => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
