use serde::{Deserialize, Serialize};

use crate::EventSource;
use layerpull_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code from the error taxonomy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod auth;
pub mod download;
pub mod general;
pub mod manifest;
pub mod progress;

pub use auth::*;
pub use download::*;
pub use general::*;
pub use manifest::*;
pub use progress::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Per-blob download lifecycle
    Download(DownloadEvent),

    /// Registry token acquisition
    Auth(AuthEvent),

    /// Manifest resolution
    Manifest(ManifestEvent),

    /// Aggregate progress across the batch
    Progress(ProgressEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Download(_) => EventSource::DOWNLOAD,
            Self::Auth(_) => EventSource::AUTH,
            Self::Manifest(_) => EventSource::MANIFEST,
            Self::Progress(_) => EventSource::PROGRESS,
        }
    }

    /// Correlation id derived from the event payload, if any
    #[must_use]
    pub fn correlation_id(&self) -> Option<String> {
        match self {
            Self::Download(event) => Some(event.digest().to_string()),
            Self::Progress(event) => event.digest().map(str::to_string),
            Self::Auth(event) => Some(event.scope_key()),
            Self::Manifest(event) => Some(event.reference().to_string()),
            Self::General(_) => None,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            // Error-level events
            Self::General(GeneralEvent::OperationFailed { .. })
            | Self::Download(DownloadEvent::Failed { .. })
            | Self::Auth(AuthEvent::Failed { .. }) => Level::ERROR,

            // Warning-level events
            Self::General(GeneralEvent::Warning { .. })
            | Self::Download(DownloadEvent::Retrying { .. } | DownloadEvent::Reset { .. }) => {
                Level::WARN
            }

            // Debug-level events (progress updates, internal state)
            Self::Download(DownloadEvent::Progress { .. } | DownloadEvent::Verifying { .. })
            | Self::Auth(AuthEvent::TokenReused { .. })
            | Self::Progress(ProgressEvent::BlobAdvanced { .. }) => Level::DEBUG,

            // Default to INFO for most events
            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "layerpull::events::general",
            Self::Download(_) => "layerpull::events::download",
            Self::Auth(_) => "layerpull::events::auth",
            Self::Manifest(_) => "layerpull::events::manifest",
            Self::Progress(_) => "layerpull::events::progress",
        }
    }
}
