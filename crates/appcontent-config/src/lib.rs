// crates/appcontent-config/src/lib.rs
// ============================================================================
// Module: App Content Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for appcontent.toml semantics.
// Dependencies: appcontent-core, serde, toml
// ============================================================================

//! ## Overview
//! `appcontent-config` defines the configuration model for the upload
//! pipeline: backend connection, upload budget, poll cadence, download limits,
//! and audit sink selection. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
