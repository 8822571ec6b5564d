// crates/appcontent-config/src/config.rs
// ============================================================================
// Module: App Content Configuration
// Description: Configuration loading and validation for the upload pipeline.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: appcontent-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to defaults, but values that are
//! present must pass validation; unknown keys are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use appcontent_core::PollPolicy;
use appcontent_core::runtime::MAX_DEADLINE;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "appcontent.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "APPCONTENT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Smallest accepted poll interval.
pub(crate) const MIN_POLL_INTERVAL_MS: u64 = 1_000;
/// Largest accepted poll interval ceiling.
pub(crate) const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Smallest accepted per-request timeout.
pub(crate) const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;
/// Largest accepted per-request timeout.
pub(crate) const MAX_REQUEST_TIMEOUT_MS: u64 = 600_000;
/// Smallest accepted storage block size.
pub(crate) const MIN_BLOCK_SIZE_BYTES: u64 = 64 * 1024;
/// Largest accepted storage block size.
pub(crate) const MAX_BLOCK_SIZE_BYTES: u64 = 100 * 1024 * 1024;
/// Largest accepted redirect limit for downloads.
pub(crate) const MAX_DOWNLOAD_REDIRECTS: u8 = 10;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Root configuration for the upload pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppContentConfig {
    /// Backend connection settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Upload budget and transfer settings.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Poll cadence for backend state transitions.
    #[serde(default)]
    pub poll: PollConfig,
    /// Installer download settings.
    #[serde(default)]
    pub download: DownloadConfig,
    /// Audit event sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl AppContentConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        Self::load_from(&resolved)
    }

    /// Loads configuration like [`AppContentConfig::load`], but falls back to
    /// defaults when no path was requested and the default file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an explicit or existing config fails to load.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some() || env::var_os(CONFIG_ENV_VAR).is_some();
        let resolved = resolve_path(path)?;
        if !explicit && !resolved.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load_from(&resolved)
    }

    /// Parses configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backend.validate()?;
        self.upload.validate()?;
        self.poll.validate()?;
        self.download.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Reads, size-checks, parses, and validates a config file.
    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// Device-management backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend API (no trailing `deviceAppManagement`).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Managed app type (for example `microsoft.graph.win32LobApp`).
    #[serde(default = "default_app_type")]
    pub app_type: String,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request timeout cap in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_type: default_app_type(),
            token_env: default_token_env(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl BackendConfig {
    /// Returns the per-request timeout cap.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates backend configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::Invalid(
                "backend.base_url must be an http or https url".to_string(),
            ));
        }
        if base_url.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "backend.base_url must not contain whitespace".to_string(),
            ));
        }
        let app_type = self.app_type.trim();
        if app_type.is_empty() || app_type.contains(['/', '?', '#']) || app_type != self.app_type {
            return Err(ConfigError::Invalid(
                "backend.app_type must be a single path segment".to_string(),
            ));
        }
        if self.token_env.is_empty()
            || !self.token_env.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(ConfigError::Invalid(
                "backend.token_env must be an environment variable name".to_string(),
            ));
        }
        if !(MIN_REQUEST_TIMEOUT_MS..=MAX_REQUEST_TIMEOUT_MS).contains(&self.request_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "backend.request_timeout_ms must be between {MIN_REQUEST_TIMEOUT_MS} and \
                 {MAX_REQUEST_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Upload
// ============================================================================

/// Upload budget and transfer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Total budget for one pipeline invocation in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Storage block size in bytes.
    #[serde(default = "default_block_size_bytes")]
    pub block_size_bytes: u64,
    /// Delete the encrypted `.bin` payload after every upload attempt.
    #[serde(default = "default_remove_encrypted_payload")]
    pub remove_encrypted_payload: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            block_size_bytes: default_block_size_bytes(),
            remove_encrypted_payload: default_remove_encrypted_payload(),
        }
    }
}

impl UploadConfig {
    /// Returns the total invocation budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validates upload configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 || self.timeout_secs > MAX_DEADLINE.as_secs() {
            return Err(ConfigError::Invalid(format!(
                "upload.timeout_secs must be between 1 and {}",
                MAX_DEADLINE.as_secs()
            )));
        }
        if !(MIN_BLOCK_SIZE_BYTES..=MAX_BLOCK_SIZE_BYTES).contains(&self.block_size_bytes) {
            return Err(ConfigError::Invalid(format!(
                "upload.block_size_bytes must be between {MIN_BLOCK_SIZE_BYTES} and \
                 {MAX_BLOCK_SIZE_BYTES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Poll
// ============================================================================

/// Poll cadence used while waiting on backend state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Delay after the first poll attempt in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
    /// Ceiling for the backed-off delay in milliseconds.
    #[serde(default = "default_poll_max_interval_ms")]
    pub max_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_interval_ms: default_poll_max_interval_ms(),
        }
    }
}

impl PollConfig {
    /// Returns the poll policy described by this section.
    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.max_interval_ms),
        )
    }

    /// Validates poll configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "poll.interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
            )));
        }
        if self.max_interval_ms < self.interval_ms {
            return Err(ConfigError::Invalid(
                "poll.max_interval_ms must be >= poll.interval_ms".to_string(),
            ));
        }
        if self.max_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "poll.max_interval_ms must be at most {MAX_POLL_INTERVAL_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Download
// ============================================================================

/// Installer download settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadConfig {
    /// Maximum installer size accepted from a URL.
    #[serde(default = "default_download_max_bytes")]
    pub max_bytes: u64,
    /// Permit plain `http` installer URLs.
    #[serde(default)]
    pub allow_http: bool,
    /// Maximum redirects followed per download.
    #[serde(default = "default_download_max_redirects")]
    pub max_redirects: u8,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_download_max_bytes(),
            allow_http: false,
            max_redirects: default_download_max_redirects(),
        }
    }
}

impl DownloadConfig {
    /// Validates download configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "download.max_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_redirects > MAX_DOWNLOAD_REDIRECTS {
            return Err(ConfigError::Invalid(format!(
                "download.max_redirects must be at most {MAX_DOWNLOAD_REDIRECTS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard events.
    None,
}

/// Audit event sink settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink receiving pipeline audit events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (JSON lines), required for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        if self.sink == AuditSinkKind::File && self.path.is_none() {
            return Err(ConfigError::Invalid(
                "audit.path is required for the file sink".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default backend base URL.
fn default_base_url() -> String {
    "https://graph.microsoft.com/beta".to_string()
}

/// Default managed app type.
fn default_app_type() -> String {
    "microsoft.graph.win32LobApp".to_string()
}

/// Default bearer token environment variable.
fn default_token_env() -> String {
    "APPCONTENT_TOKEN".to_string()
}

/// Default per-request timeout cap.
const fn default_request_timeout_ms() -> u64 {
    60_000
}

/// Default invocation budget (30 minutes).
const fn default_timeout_secs() -> u64 {
    1_800
}

/// Default storage block size (6 MiB).
const fn default_block_size_bytes() -> u64 {
    6 * 1024 * 1024
}

/// Default `.bin` cleanup behavior.
const fn default_remove_encrypted_payload() -> bool {
    true
}

/// Default initial poll interval.
const fn default_poll_interval_ms() -> u64 {
    1_000
}

/// Default poll interval ceiling.
const fn default_poll_max_interval_ms() -> u64 {
    10_000
}

/// Default download size cap (8 GiB).
const fn default_download_max_bytes() -> u64 {
    8 * 1024 * 1024 * 1024
}

/// Default download redirect limit.
const fn default_download_max_redirects() -> u8 {
    5
}

// ============================================================================
// SECTION: Tests
// ============================================================================
