//! Blob download error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DownloadError {
    #[error("checksum mismatch for {digest}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        digest: String,
        expected: String,
        actual: String,
    },

    #[error("blob {digest} failed after {attempts} attempts ({kind}): {last_error}")]
    RetryBudgetExceeded {
        digest: String,
        attempts: u32,
        kind: String,
        last_error: String,
    },

    #[error("blob {digest} exceeded {resets} authentication/range resets")]
    ResetLimitExceeded { digest: String, resets: u32 },

    #[error("invalid digest {value}: {reason}")]
    InvalidDigest { value: String, reason: String },

    #[error("unsupported digest algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

impl UserFacingError for DownloadError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::RetryBudgetExceeded { .. } => {
                Some("Partial data was removed; rerun the command to start the blob again.")
            }
            Self::ResetLimitExceeded { .. } => {
                Some("The registry keeps rejecting credentials or ranges; check its configuration.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. } | Self::RetryBudgetExceeded { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::ChecksumMismatch { .. } => "download.checksum_mismatch",
            Self::RetryBudgetExceeded { .. } => "download.retry_budget_exceeded",
            Self::ResetLimitExceeded { .. } => "download.reset_limit_exceeded",
            Self::InvalidDigest { .. } => "download.invalid_digest",
            Self::UnsupportedAlgorithm { .. } => "download.unsupported_algorithm",
        })
    }
}
