// crates/appcontent-core/src/lib.rs
// ============================================================================
// Module: App Content Core Library
// Description: Public API surface for the app content upload core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! App content core holds everything the upload pipeline shares that does not
//! perform I/O: backend identifiers and records, the upload-state machine,
//! encryption metadata, the shared deadline, the poll loop, and the backend
//! and storage interfaces. Network and filesystem code live in
//! `appcontent-pipeline`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::BackendError;
pub use interfaces::BlobError;
pub use interfaces::BlobReceipt;
pub use interfaces::BlobStore;
pub use interfaces::ContentBackend;
pub use interfaces::ErrorClass;
pub use interfaces::ProgressCallback;
pub use interfaces::TransferProgress;
pub use interfaces::classify_status;
pub use runtime::CancellationToken;
pub use runtime::Clock;
pub use runtime::Deadline;
pub use runtime::Exhaustion;
pub use runtime::ManualClock;
pub use runtime::PollError;
pub use runtime::PollPolicy;
pub use runtime::PollStep;
pub use runtime::PollSuccess;
pub use runtime::SystemClock;
pub use runtime::poll_until;
