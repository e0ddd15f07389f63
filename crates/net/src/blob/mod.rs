//! Resumable, verified download of a single blob
//!
//! A blob moves through `Init -> RangeCheck -> Streaming -> Verifying` until
//! its content hash matches the digest. Authentication and invalid-range
//! responses restart the blob without consuming its retry budget; every other
//! failure removes the partial file, backs off and counts as one attempt.

mod config;
mod downloader;
mod layout;
mod resume;
mod retry;
mod stream;
mod validation;

pub use config::{AttemptError, BlobDownloadConfig, DownloadAttemptState};
pub use downloader::BlobDownloader;
pub use layout::{blob_path, layers_dir};
