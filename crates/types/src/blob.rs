//! Blob descriptors and verified blob files

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Digest;

/// A blob the manifest asks us to fetch. Identity is the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    pub digest: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

impl BlobDescriptor {
    #[must_use]
    pub fn new(digest: Digest) -> Self {
        Self {
            digest,
            size_hint: None,
            media_type: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// A blob that exists on disk and whose content hash matched its digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedBlobFile {
    pub path: PathBuf,
    pub digest: Digest,
    pub size: u64,
}
