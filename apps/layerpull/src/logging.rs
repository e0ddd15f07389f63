//! Structured logging integration for events
//!
//! Converts pull events into tracing records with structured fields so a
//! `--debug` log file carries the full download history of a run.

use layerpull_events::{
    AppEvent, AuthEvent, DownloadEvent, EventMessage, GeneralEvent, ManifestEvent, ProgressEvent,
};
use tracing::{debug, error, info, trace, warn};

/// Log an `AppEvent` using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();

    match &message.event {
        AppEvent::Download(event) => match event {
            DownloadEvent::Started {
                digest,
                url,
                resume_offset,
                total_bytes,
            } => info!(
                source,
                event_id = %meta.event_id,
                digest = %digest,
                url = %url,
                resume_offset,
                total_bytes = ?total_bytes,
                "Blob download started"
            ),
            DownloadEvent::Resuming {
                digest,
                offset,
                remote_size,
            } => info!(
                source,
                event_id = %meta.event_id,
                digest = %digest,
                offset,
                remote_size,
                "Resuming blob"
            ),
            DownloadEvent::Progress {
                digest,
                bytes_on_disk,
                total_bytes,
            } => trace!(
                source,
                digest = %digest,
                bytes_on_disk,
                total_bytes = ?total_bytes,
                "Blob progress"
            ),
            DownloadEvent::Verifying { digest, bytes } => debug!(
                source,
                digest = %digest,
                bytes,
                "Verifying blob"
            ),
            DownloadEvent::Retrying {
                digest,
                attempt,
                max_attempts,
                reason,
                backoff_delay,
            } => warn!(
                source,
                event_id = %meta.event_id,
                digest = %digest,
                attempt,
                max_attempts,
                reason = %reason,
                backoff_ms = u64::try_from(backoff_delay.as_millis()).unwrap_or(u64::MAX),
                "Retrying blob"
            ),
            DownloadEvent::Reset {
                digest,
                cause,
                resets,
            } => warn!(
                source,
                event_id = %meta.event_id,
                digest = %digest,
                cause = ?cause,
                resets,
                "Restarting blob"
            ),
            DownloadEvent::Completed {
                digest,
                path,
                bytes,
                attempts,
            } => info!(
                source,
                event_id = %meta.event_id,
                digest = %digest,
                path = %path.display(),
                bytes,
                attempts,
                "Blob verified"
            ),
            DownloadEvent::Failed { digest, failure } => error!(
                source,
                event_id = %meta.event_id,
                digest = %digest,
                retryable = failure.retryable,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "Blob download failed"
            ),
        },

        AppEvent::Auth(event) => match event {
            AuthEvent::Anonymous {
                registry,
                repository,
            } => debug!(source, registry = %registry, repository = %repository, "Anonymous access"),
            AuthEvent::TokenAcquired {
                registry,
                repository,
                expires_in,
                forced,
            } => info!(
                source,
                registry = %registry,
                repository = %repository,
                expires_in,
                forced,
                "Token acquired"
            ),
            AuthEvent::TokenReused {
                registry,
                repository,
            } => trace!(source, registry = %registry, repository = %repository, "Token reused"),
            AuthEvent::Failed {
                registry,
                repository,
                failure,
            } => error!(
                source,
                registry = %registry,
                repository = %repository,
                code = ?failure.code,
                message = %failure.message,
                "Token acquisition failed"
            ),
        },

        AppEvent::Manifest(event) => match event {
            ManifestEvent::Fetching { reference } => {
                info!(source, reference = %reference, "Fetching manifest");
            }
            ManifestEvent::PlatformSelected {
                reference,
                platform,
                digest,
            } => info!(
                source,
                reference = %reference,
                platform = %platform,
                digest = %digest,
                "Platform selected"
            ),
            ManifestEvent::Resolved {
                reference,
                media_type,
                blobs,
                total_bytes,
            } => info!(
                source,
                reference = %reference,
                media_type = %media_type,
                blobs,
                total_bytes = ?total_bytes,
                "Manifest resolved"
            ),
        },

        AppEvent::Progress(event) => match event {
            ProgressEvent::BlobCompleted { summary, .. } => {
                info!(source, summary = %summary, "Progress");
            }
            other => trace!(source, event = ?other, "Progress"),
        },

        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(source, context = ?context, "{message}");
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(source, operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(source, operation = %operation, success, "Operation completed");
            }
            GeneralEvent::OperationFailed { operation, error } => {
                error!(source, operation = %operation, error = %error, "Operation failed");
            }
        },
    }
}
