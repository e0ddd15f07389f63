//! Registry authentication error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthError {
    #[error("registry probe to {registry} failed: {message}")]
    ProbeFailed { registry: String, message: String },

    #[error("unsupported authentication scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error("authentication challenge is missing {parameter}")]
    MalformedChallenge { parameter: String },

    #[error("token request to {realm} failed with HTTP {status}")]
    TokenRequestFailed { realm: String, status: u16 },

    #[error("token request to {realm} failed: {message}")]
    TokenTransportFailed { realm: String, message: String },

    #[error("invalid token response: {message}")]
    InvalidTokenResponse { message: String },
}

impl UserFacingError for AuthError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedScheme { .. } => {
                Some("Only bearer-token registries are supported.")
            }
            Self::TokenRequestFailed { .. } => {
                Some("The repository may be private or the name misspelled.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProbeFailed { .. } | Self::TokenTransportFailed { .. }
        ) || matches!(self, Self::TokenRequestFailed { status, .. } if *status >= 500)
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::ProbeFailed { .. } => "auth.probe_failed",
            Self::UnsupportedScheme { .. } => "auth.unsupported_scheme",
            Self::MalformedChallenge { .. } => "auth.malformed_challenge",
            Self::TokenRequestFailed { .. } => "auth.token_request_failed",
            Self::TokenTransportFailed { .. } => "auth.token_transport_failed",
            Self::InvalidTokenResponse { .. } => "auth.invalid_token_response",
        })
    }
}
