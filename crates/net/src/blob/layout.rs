//! On-disk layout of downloaded blobs

use layerpull_types::{sanitize_repository, Digest};
use std::path::{Path, PathBuf};

/// `<output>/<sanitized-repo>_layers`
#[must_use]
pub fn layers_dir(output_dir: &Path, repository: &str) -> PathBuf {
    output_dir.join(format!("{}_layers", sanitize_repository(repository)))
}

/// `<output>/<sanitized-repo>_layers/blobs/<algorithm>/<hex>`
#[must_use]
pub fn blob_path(output_dir: &Path, repository: &str, digest: &Digest) -> PathBuf {
    layers_dir(output_dir, repository)
        .join("blobs")
        .join(digest.algorithm().as_str())
        .join(digest.hex())
}
