//! Manifest resolution error types

use crate::UserFacingError;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManifestError {
    #[error("failed to parse manifest: {message}")]
    ParseError { message: String },

    #[error("unsupported manifest schema version {version}")]
    UnsupportedSchema { version: u32 },

    #[error("no manifest for platform {platform}")]
    PlatformNotFound { platform: String },

    #[error("manifest lists no blobs")]
    Empty,

    #[error("invalid image reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },
}

impl UserFacingError for ManifestError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PlatformNotFound { .. } => Some("Pick another --arch/--os for this image."),
            Self::InvalidReference { .. } => {
                Some("Use the form [registry/]repository[:tag|@digest].")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::ParseError { .. } => "manifest.parse",
            Self::UnsupportedSchema { .. } => "manifest.unsupported_schema",
            Self::PlatformNotFound { .. } => "manifest.platform_not_found",
            Self::Empty => "manifest.empty",
            Self::InvalidReference { .. } => "manifest.invalid_reference",
        })
    }
}
