//! Image references and target platforms

use layerpull_errors::ManifestError;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Digest;

/// Tag used when a reference names neither a tag nor a digest
pub const DEFAULT_TAG: &str = "latest";

/// What a reference points at inside a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceTarget {
    Tag(String),
    Digest(Digest),
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.write_str(tag),
            Self::Digest(digest) => write!(f, "{digest}"),
        }
    }
}

/// A parsed `[registry/]repository[:tag|@digest]` reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub target: ReferenceTarget,
}

impl ImageReference {
    /// Parse a user supplied image reference.
    ///
    /// A leading path component containing `.` or `:` (or equal to
    /// `localhost`) names the registry; otherwise `default_registry` is used.
    /// Single-component names get the `library/` namespace.
    ///
    /// # Errors
    ///
    /// Returns `ManifestError::InvalidReference` for empty names, empty
    /// path components, or an unparsable `@digest` suffix.
    pub fn parse(input: &str, default_registry: &str) -> Result<Self, ManifestError> {
        let invalid = |reason: &str| ManifestError::InvalidReference {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        let input_trimmed = input.trim();
        if input_trimmed.is_empty() {
            return Err(invalid("image name is empty"));
        }

        let (name, digest) = match input_trimmed.split_once('@') {
            Some((name, digest)) => {
                let digest: Digest = digest
                    .parse()
                    .map_err(|e: layerpull_errors::DownloadError| invalid(&e.to_string()))?;
                (name, Some(digest))
            }
            None => (input_trimmed, None),
        };

        let (registry, remainder) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest)
            }
            _ => (default_registry.to_string(), name),
        };

        // A ':' after the last '/' separates the tag.
        let last_slash = remainder.rfind('/').map_or(0, |i| i + 1);
        let (repository, tag) = match remainder[last_slash..].find(':') {
            Some(idx) => {
                let split = last_slash + idx;
                (&remainder[..split], Some(&remainder[split + 1..]))
            }
            None => (remainder, None),
        };

        if repository.is_empty() || repository.split('/').any(str::is_empty) {
            return Err(invalid("repository has an empty path component"));
        }
        if matches!(tag, Some("")) {
            return Err(invalid("tag is empty"));
        }

        // Official images live under `library/` on the default registry only.
        let repository = if repository.contains('/') || registry != default_registry {
            repository.to_string()
        } else {
            format!("library/{repository}")
        };

        let target = match (digest, tag) {
            (Some(digest), _) => ReferenceTarget::Digest(digest),
            (None, Some(tag)) => ReferenceTarget::Tag(tag.to_string()),
            (None, None) => ReferenceTarget::Tag(DEFAULT_TAG.to_string()),
        };

        Ok(Self {
            registry,
            repository,
            target,
        })
    }

    /// Repository name usable as a single path component
    #[must_use]
    pub fn sanitized_repository(&self) -> String {
        sanitize_repository(&self.repository)
    }

    /// Replace the registry, e.g. from a `--registry` flag
    #[must_use]
    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }
}

/// Replace `/` with `_` so a repository name fits in one directory name
#[must_use]
pub fn sanitize_repository(repository: &str) -> String {
    repository.replace('/', "_")
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            ReferenceTarget::Tag(tag) => {
                write!(f, "{}/{}:{tag}", self.registry, self.repository)
            }
            ReferenceTarget::Digest(digest) => {
                write!(f, "{}/{}@{digest}", self.registry, self.repository)
            }
        }
    }
}

/// Platform used to pick an entry from a manifest list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    #[must_use]
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: None,
        }
    }

    #[must_use]
    pub fn with_variant(mut self, variant: Option<String>) -> Self {
        self.variant = variant;
        self
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new("linux", "amd64")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}
