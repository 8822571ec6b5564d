// crates/appcontent-core/src/core/identifiers.rs
// ============================================================================
// Module: App Content Identifiers
// Description: Opaque backend-assigned identifiers for apps and content.
// Purpose: Keep app, content version, and content file ids from being mixed up.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are assigned by the device-management backend and are treated
//! as opaque strings. Each identifier type is distinct so a content file id
//! can never be passed where a content version id is expected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque string identifier with the shared accessor surface.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true when the identifier is empty or whitespace.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

opaque_id!(
    /// Managed app (parent resource) identifier.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string assigned by the backend.
    AppId
);

opaque_id!(
    /// Content version identifier, allocated once per upload attempt.
    ///
    /// # Invariants
    /// - Never reused across upload attempts for the same app.
    ContentVersionId
);

opaque_id!(
    /// Content file identifier within a content version.
    ContentFileId
);

// ============================================================================
// SECTION: Composite References
// ============================================================================

/// Reference to a content version under an app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentVersionRef {
    /// Parent app identifier.
    pub app_id: AppId,
    /// Content version identifier.
    pub content_version_id: ContentVersionId,
}

impl ContentVersionRef {
    /// Creates a content version reference.
    #[must_use]
    pub const fn new(app_id: AppId, content_version_id: ContentVersionId) -> Self {
        Self {
            app_id,
            content_version_id,
        }
    }

    /// Returns a reference to a file within this content version.
    #[must_use]
    pub fn file(&self, content_file_id: ContentFileId) -> ContentFileRef {
        ContentFileRef {
            app_id: self.app_id.clone(),
            content_version_id: self.content_version_id.clone(),
            content_file_id,
        }
    }
}

/// Reference to a content file under an app content version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFileRef {
    /// Parent app identifier.
    pub app_id: AppId,
    /// Content version identifier.
    pub content_version_id: ContentVersionId,
    /// Content file identifier.
    pub content_file_id: ContentFileId,
}

impl fmt::Display for ContentFileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_id, self.content_version_id, self.content_file_id)
    }
}
