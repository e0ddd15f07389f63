//! Network-related error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetworkError {
    #[error("connection timeout to {url}")]
    Timeout { url: String },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("transfer failed: {0}")]
    TransportFailed(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported protocol: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("HTTP error {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("unexpected content range from {url}: {message}")]
    UnexpectedContentRange { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("rate limited: retry after {seconds} seconds")]
    RateLimited { seconds: u64 },
}

impl NetworkError {
    /// Build an HTTP status error from a raw status code
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            message: message.into(),
        }
    }
}

impl UserFacingError for NetworkError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailed(_) => {
                Some("Check your network connection or proxy settings and retry.")
            }
            Self::RateLimited { .. } => Some("The registry is throttling requests; lower --threads."),
            Self::InvalidUrl(_) | Self::UnsupportedProtocol { .. } => {
                Some("Check the registry address; use http:// only for local registries.")
            }
            Self::HttpError { status, .. } if *status == 404 => {
                Some("Verify that the image name and tag exist on the registry.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::ConnectionFailed(_)
            | Self::TransportFailed(_)
            | Self::UnexpectedContentRange { .. }
            | Self::RateLimited { .. } => true,
            Self::HttpError { status, .. } => matches!(status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::Timeout { .. } => "network.timeout",
            Self::ConnectionFailed(_) => "network.connection_failed",
            Self::TransportFailed(_) => "network.transport_failed",
            Self::InvalidUrl(_) => "network.invalid_url",
            Self::UnsupportedProtocol { .. } => "network.unsupported_protocol",
            Self::HttpError { .. } => "network.http_status",
            Self::UnexpectedContentRange { .. } => "network.content_range",
            Self::ClientBuild(_) => "network.client_build",
            Self::RateLimited { .. } => "network.rate_limited",
        })
    }
}
