#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for layerpull
//!
//! This crate talks to OCI/Docker distribution registries: token
//! acquisition, pooled sessions with transport retries, the resumable
//! per-blob download state machine and the bounded worker pool that runs it
//! across a whole image.

mod auth;
pub mod blob;
mod client;
mod connection;
mod context;
mod endpoint;
mod manifest;
mod orchestrator;

pub use auth::{parse_challenge, pull_scope, AuthHeaders, AuthToken, BearerChallenge, TokenManager};
pub use blob::{
    blob_path, layers_dir, AttemptError, BlobDownloadConfig, BlobDownloader,
    DownloadAttemptState,
};
pub use client::{NetClient, NetConfig};
pub use connection::ConnectionManager;
pub use context::{PullContext, PullContextBuilder};
pub use endpoint::{validate_url, RegistryEndpoint};
pub use manifest::ManifestResolver;
pub use orchestrator::{BlobFetcher, Orchestrator};

use layerpull_errors::Error;
use layerpull_events::EventEmitter;
use layerpull_types::{ImageReference, Platform, VerifiedBlobFile};
use std::sync::Arc;

/// Pull every blob of `reference` for `platform` into the output directory
///
/// # Errors
///
/// Returns the first manifest, authentication or blob error, or
/// `Error::Cancelled` when the context's cancellation token fires.
pub async fn pull(
    ctx: &Arc<PullContext>,
    reference: &ImageReference,
    platform: &Platform,
) -> Result<Vec<VerifiedBlobFile>, Error> {
    let operation = format!("pull {reference}");
    ctx.emit_operation_started(&operation);

    let result = pull_inner(ctx, reference, platform).await;
    match &result {
        Ok(_) => ctx.emit_operation_completed(&operation, true),
        Err(e) => ctx.emit_operation_failed(&operation, e.to_string()),
    }
    result
}

async fn pull_inner(
    ctx: &Arc<PullContext>,
    reference: &ImageReference,
    platform: &Platform,
) -> Result<Vec<VerifiedBlobFile>, Error> {
    let endpoint = RegistryEndpoint::parse(&reference.registry)?;
    if endpoint.is_plain_http() {
        ctx.emit_warning("registry is reached over plain HTTP", endpoint.name());
    }
    if ctx.connections().config().insecure {
        ctx.emit_warning("TLS certificate verification is disabled", endpoint.name());
    }
    let blobs = ManifestResolver::new(ctx, &endpoint)
        .resolve(reference, platform)
        .await?;

    let downloader = BlobDownloader::new(Arc::clone(ctx), endpoint, reference.repository.clone());
    let orchestrator = Orchestrator::new(downloader, ctx.concurrency())
        .with_progress(Arc::clone(ctx.progress()));
    orchestrator.run(&blobs, ctx.cancellation()).await
}
