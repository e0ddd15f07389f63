#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Manifest interpretation for layerpull
//!
//! Turns a manifest document into the ordered list of blobs to fetch.
//! Fetching the document is done by the network crate.

pub mod media;
pub mod models;

pub use models::{Descriptor, ImageManifest, ManifestIndex, PlatformSpec, SchemaV1Manifest};

use layerpull_errors::ManifestError;
use layerpull_types::{BlobDescriptor, Digest, Platform};
use serde::Deserialize;
use std::collections::HashSet;

/// A parsed manifest of any supported kind
#[derive(Debug, Clone)]
pub enum Manifest {
    Image(ImageManifest),
    Index(ManifestIndex),
    SchemaV1(SchemaV1Manifest),
}

/// Just enough of a manifest to decide how to parse the rest
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Probe {
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Option<serde_json::Value>,
}

impl Manifest {
    /// Parse a manifest body.
    ///
    /// The `mediaType` field wins over the response `Content-Type`; documents
    /// carrying neither are classified by shape.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::ParseError` for malformed JSON and
    /// `ManifestError::UnsupportedSchema` for unknown schema versions.
    pub fn parse(body: &[u8], content_type: Option<&str>) -> Result<Self, ManifestError> {
        let probe: Probe = serde_json::from_slice(body).map_err(parse_error)?;

        let media_type = probe
            .media_type
            .as_deref()
            .or(content_type)
            .map(media::essence)
            .unwrap_or_default();

        match probe.schema_version {
            Some(1) => {
                return serde_json::from_slice(body)
                    .map(Self::SchemaV1)
                    .map_err(parse_error)
            }
            Some(2) | None => {}
            Some(version) => return Err(ManifestError::UnsupportedSchema { version }),
        }

        if media::is_schema1(media_type) {
            return serde_json::from_slice(body)
                .map(Self::SchemaV1)
                .map_err(parse_error);
        }

        if media::is_index(media_type) || probe.manifests.is_some() {
            serde_json::from_slice(body)
                .map(Self::Index)
                .map_err(parse_error)
        } else {
            serde_json::from_slice(body)
                .map(Self::Image)
                .map_err(parse_error)
        }
    }

    /// Human readable manifest kind for events and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(m) => match m.media_type.as_deref().map(media::essence) {
                Some(media::OCI_MANIFEST_V1) => media::OCI_MANIFEST_V1,
                _ => media::DOCKER_MANIFEST_V2,
            },
            Self::Index(m) => match m.media_type.as_deref().map(media::essence) {
                Some(media::OCI_INDEX_V1) => media::OCI_INDEX_V1,
                _ => media::DOCKER_MANIFEST_LIST_V2,
            },
            Self::SchemaV1(_) => media::DOCKER_MANIFEST_V1,
        }
    }

    /// Blobs referenced by a single-image manifest.
    ///
    /// Schema 2 / OCI yield the config blob followed by the layers; schema 1
    /// yields its `fsLayers` in document order. Repeated digests keep their
    /// first position.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::ParseError` if the manifest is an index or a
    /// digest is malformed, and `ManifestError::Empty` if nothing is listed.
    pub fn blob_descriptors(&self) -> Result<Vec<BlobDescriptor>, ManifestError> {
        let raw: Vec<BlobDescriptor> = match self {
            Self::Image(manifest) => std::iter::once(&manifest.config)
                .chain(manifest.layers.iter())
                .map(to_blob_descriptor)
                .collect::<Result<_, _>>()?,
            Self::SchemaV1(manifest) => manifest
                .fs_layers
                .iter()
                .map(|layer| parse_digest(&layer.blob_sum).map(BlobDescriptor::new))
                .collect::<Result<_, _>>()?,
            Self::Index(_) => {
                return Err(ManifestError::ParseError {
                    message: "manifest list must be narrowed to one platform first".to_string(),
                })
            }
        };

        let blobs = dedupe(raw);
        if blobs.is_empty() {
            return Err(ManifestError::Empty);
        }
        Ok(blobs)
    }
}

impl ManifestIndex {
    /// Pick the entry for `platform`.
    ///
    /// OS and architecture must match. A requested variant must match
    /// exactly; without one, an entry lacking a variant is preferred over
    /// the first variant-specific match.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::PlatformNotFound` when no entry matches.
    pub fn select(&self, platform: &Platform) -> Result<&Descriptor, ManifestError> {
        let candidates: Vec<&Descriptor> = self
            .manifests
            .iter()
            .filter(|entry| {
                entry.platform.as_ref().is_some_and(|p| {
                    p.os == platform.os && p.architecture == platform.architecture
                })
            })
            .collect();

        let chosen = match &platform.variant {
            Some(variant) => candidates.into_iter().find(|entry| {
                entry
                    .platform
                    .as_ref()
                    .and_then(|p| p.variant.as_ref())
                    == Some(variant)
            }),
            None => candidates
                .iter()
                .find(|entry| entry.platform.as_ref().is_some_and(|p| p.variant.is_none()))
                .or_else(|| candidates.first())
                .copied(),
        };

        chosen.ok_or_else(|| ManifestError::PlatformNotFound {
            platform: platform.to_string(),
        })
    }
}

fn to_blob_descriptor(descriptor: &Descriptor) -> Result<BlobDescriptor, ManifestError> {
    let mut blob = BlobDescriptor::new(parse_digest(&descriptor.digest)?);
    blob.size_hint = descriptor.size;
    blob.media_type.clone_from(&descriptor.media_type);
    Ok(blob)
}

/// Parse a digest found in a manifest
///
/// # Errors
///
/// Returns `ManifestError::ParseError` describing the invalid digest.
pub fn parse_digest(value: &str) -> Result<Digest, ManifestError> {
    value.parse().map_err(|e| ManifestError::ParseError {
        message: format!("{e}"),
    })
}

fn dedupe(blobs: Vec<BlobDescriptor>) -> Vec<BlobDescriptor> {
    let mut seen = HashSet::new();
    let before = blobs.len();
    let unique: Vec<BlobDescriptor> = blobs
        .into_iter()
        .filter(|blob| seen.insert(blob.digest.clone()))
        .collect();
    if unique.len() != before {
        tracing::debug!(
            duplicates = before - unique.len(),
            "dropped repeated blob digests from manifest"
        );
    }
    unique
}

fn parse_error(err: serde_json::Error) -> ManifestError {
    ManifestError::ParseError {
        message: err.to_string(),
    }
}
