//! Range-resume planning for partially downloaded blobs

use super::config::AttemptError;
use crate::auth::AuthHeaders;
use crate::client::NetClient;
use layerpull_errors::Error;
use reqwest::header::{HeaderValue, CONTENT_LENGTH, ETAG};
use reqwest::StatusCode;
use std::path::Path;
use tokio::fs as tokio_fs;

/// Size of the file at `path`, or 0 when it does not exist
pub(super) async fn local_size(path: &Path) -> Result<u64, Error> {
    match tokio_fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(Error::io_with_path(&e, path)),
    }
}

/// Remove a partial or rejected file; a missing file is fine
pub(super) async fn discard(path: &Path) {
    match tokio_fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial blob"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove partial blob"),
    }
}

/// What to do with the bytes already on disk
#[derive(Debug)]
pub(super) enum RangePlan {
    /// Download from zero, discarding anything on disk
    Fresh,
    /// Local file is at least as large as the remote blob; only verify it
    Verify,
    /// Ask for the missing tail
    Resume {
        offset: u64,
        remote_size: u64,
        etag: Option<HeaderValue>,
    },
}

/// Decide how to continue a blob with `bytes_on_disk` bytes present.
///
/// A failed or inconclusive `HEAD` falls back to a fresh download; only a
/// `401` is surfaced so credentials can be renewed.
pub(super) async fn plan_range(
    session: &NetClient,
    url: &str,
    auth: &AuthHeaders,
    bytes_on_disk: u64,
) -> Result<RangePlan, AttemptError> {
    if bytes_on_disk == 0 {
        return Ok(RangePlan::Fresh);
    }

    let response = match session.head(url, auth.header_map()).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%url, error = %e, "HEAD failed, restarting blob from zero");
            return Ok(RangePlan::Fresh);
        }
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(AttemptError::Unauthorized);
    }
    if !status.is_success() {
        tracing::warn!(%url, status = status.as_u16(), "HEAD rejected, restarting blob from zero");
        return Ok(RangePlan::Fresh);
    }

    // Content-Length is read from the header: the HEAD body itself is empty.
    let Some(remote_size) = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
    else {
        tracing::warn!(%url, "HEAD without Content-Length, restarting blob from zero");
        return Ok(RangePlan::Fresh);
    };

    if remote_size <= bytes_on_disk {
        return Ok(RangePlan::Verify);
    }

    Ok(RangePlan::Resume {
        offset: bytes_on_disk,
        remote_size,
        etag: response.headers().get(ETAG).cloned(),
    })
}
