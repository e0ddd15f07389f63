use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::FailureContext;

/// Why a blob download restarted without consuming retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCause {
    /// The registry answered 401 and credentials were refreshed
    Unauthorized,
    /// The registry answered 416 to a range request
    RangeNotSatisfiable,
    /// The token exchange or session rebuild failed
    CredentialsUnavailable,
}

/// Per-blob download lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DownloadEvent {
    /// A request for the blob body was sent
    Started {
        digest: String,
        url: String,
        resume_offset: u64,
        total_bytes: Option<u64>,
    },

    /// A partial file exists and a range request will continue it
    Resuming {
        digest: String,
        offset: u64,
        remote_size: u64,
    },

    /// Bytes written so far for the current attempt
    Progress {
        digest: String,
        bytes_on_disk: u64,
        total_bytes: Option<u64>,
    },

    /// Full-file checksum is being computed
    Verifying { digest: String, bytes: u64 },

    /// A budget-consuming failure happened; another attempt follows
    Retrying {
        digest: String,
        attempt: u32,
        max_attempts: u32,
        reason: String,
        backoff_delay: Duration,
    },

    /// The blob restarts from scratch after an auth or range reset
    Reset {
        digest: String,
        cause: ResetCause,
        resets: u32,
    },

    /// The blob is on disk and matches its digest
    Completed {
        digest: String,
        path: PathBuf,
        bytes: u64,
        attempts: u32,
    },

    /// The blob could not be fetched
    Failed {
        digest: String,
        failure: FailureContext,
    },
}

impl DownloadEvent {
    /// Digest of the blob this event concerns
    #[must_use]
    pub fn digest(&self) -> &str {
        match self {
            Self::Started { digest, .. }
            | Self::Resuming { digest, .. }
            | Self::Progress { digest, .. }
            | Self::Verifying { digest, .. }
            | Self::Retrying { digest, .. }
            | Self::Reset { digest, .. }
            | Self::Completed { digest, .. }
            | Self::Failed { digest, .. } => digest,
        }
    }
}
