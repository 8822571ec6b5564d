// crates/appcontent-core/src/core/mod.rs
// ============================================================================
// Module: App Content Core Types
// Description: Identifiers, backend records, and encryption metadata.
// Purpose: Provide stable, serializable types shared by every pipeline stage.
// Dependencies: base64, serde, zeroize
// ============================================================================

//! ## Overview
//! Core types describe the objects that flow between pipeline stages: backend
//! identifiers, content version and content file records, the upload state
//! machine, and the metadata produced by encryption.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod content;
pub mod encryption;
pub mod identifiers;
pub mod state;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use content::ContentFileRecord;
pub use content::ContentFileSpec;
pub use content::ContentVersion;
pub use content::ENCRYPTED_EXTENSION;
pub use content::EncryptedPayload;
pub use content::StorageEndpoint;
pub use content::encrypted_path_for;
pub use content::is_encrypted_path;
pub use encryption::EncryptionMetadata;
pub use encryption::FILE_DIGEST_ALGORITHM;
pub use encryption::FileEncryptionInfo;
pub use encryption::PROFILE_IDENTIFIER;
pub use identifiers::AppId;
pub use identifiers::ContentFileId;
pub use identifiers::ContentFileRef;
pub use identifiers::ContentVersionId;
pub use identifiers::ContentVersionRef;
pub use state::UploadState;
