use serde::{Deserialize, Serialize};

/// Manifest resolution events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ManifestEvent {
    /// Fetching the manifest for a reference
    Fetching { reference: String },

    /// A manifest list was narrowed to one platform entry
    PlatformSelected {
        reference: String,
        platform: String,
        digest: String,
    },

    /// Blob descriptors extracted from the manifest
    Resolved {
        reference: String,
        media_type: String,
        blobs: usize,
        total_bytes: Option<u64>,
    },
}

impl ManifestEvent {
    #[must_use]
    pub fn reference(&self) -> &str {
        match self {
            Self::Fetching { reference }
            | Self::PlatformSelected { reference, .. }
            | Self::Resolved { reference, .. } => reference,
        }
    }
}
