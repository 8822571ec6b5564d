// crates/appcontent-cli/src/main.rs
// ============================================================================
// Module: App Content CLI Entry Point
// Description: Command dispatcher for installer uploads and config checks.
// Purpose: Run one encrypted content upload from the command line.
// Dependencies: appcontent-config, appcontent-pipeline, clap, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `appcontent upload` resolves the installer, runs the upload pipeline under
//! the configured time budget, and prints the JSON receipt. `appcontent config
//! validate` loads and validates the configuration file. Output goes through
//! explicit stdout/stderr writers; failures exit with status 1.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use appcontent_config::AppContentConfig;
use appcontent_core::AppId;
use appcontent_pipeline::ContentUploadPipeline;
use appcontent_pipeline::SourceSpec;
use appcontent_pipeline::UploadOutcome;
use clap::ArgAction;
use clap::ArgGroup;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "appcontent", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt, upload, commit and publish an installer.
    Upload(UploadCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `appcontent upload`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "url"])))]
struct UploadCommand {
    /// Target app identifier.
    #[arg(long, value_name = "ID")]
    app_id: String,
    /// Local installer path.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// Installer download URL.
    #[arg(long, value_name = "URL")]
    url: Option<String>,
    /// Config file path (defaults to `appcontent.toml` or `APPCONTENT_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Overrides `upload.timeout_secs`.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `appcontent config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file path (defaults to `appcontent.toml` or `APPCONTENT_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// JSON printed when there is nothing to upload.
#[derive(Debug, Serialize)]
struct NothingToUpload {
    /// Fixed status label.
    status: &'static str,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying the user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("appcontent {version}"))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        return Err(CliError::new("no command given; see `appcontent --help`".to_string()));
    };
    match command {
        Commands::Upload(command) => command_upload(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

// ============================================================================
// SECTION: Upload Command
// ============================================================================

/// Executes the upload command.
fn command_upload(command: &UploadCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let timeout = resolve_timeout(&config, command.timeout_secs)?;
    let pipeline = ContentUploadPipeline::from_config(&config)
        .map_err(|err| CliError::new(format!("pipeline setup failed: {err}")))?;
    let app_id = parse_app_id(&command.app_id)?;
    let spec = source_spec(command);
    let outcome = pipeline
        .run(&spec, &app_id, timeout)
        .map_err(|err| CliError::new(format!("upload failed: {err}")))?;
    match outcome {
        UploadOutcome::Committed(receipt) => write_json(&receipt)?,
        UploadOutcome::NothingToUpload => write_json(&NothingToUpload {
            status: "nothing_to_upload",
        })?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Builds the source spec from the mutually exclusive source flags.
fn source_spec(command: &UploadCommand) -> SourceSpec {
    match (&command.file, &command.url) {
        (Some(path), _) => SourceSpec::from_file(path.display().to_string()),
        (None, Some(url)) => SourceSpec::from_url(url.clone()),
        (None, None) => SourceSpec::default(),
    }
}

/// Validates the app identifier argument.
fn parse_app_id(raw: &str) -> CliResult<AppId> {
    let app_id = AppId::new(raw.trim());
    if app_id.is_blank() {
        return Err(CliError::new("--app-id must not be empty".to_string()));
    }
    Ok(app_id)
}

/// Returns the run budget, applying and validating the CLI override.
fn resolve_timeout(config: &AppContentConfig, override_secs: Option<u64>) -> CliResult<Duration> {
    let Some(secs) = override_secs else {
        return Ok(config.upload.timeout());
    };
    let mut adjusted = config.clone();
    adjusted.upload.timeout_secs = secs;
    adjusted
        .validate()
        .map_err(|err| CliError::new(format!("invalid --timeout-secs: {err}")))?;
    Ok(adjusted.upload.timeout())
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = AppContentConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads config, falling back to defaults when no file is present.
fn load_config(path: Option<&Path>) -> CliResult<AppContentConfig> {
    AppContentConfig::load_or_default(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
