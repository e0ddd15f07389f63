use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Aggregate progress across all blobs of a pull
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// The batch size is known
    BatchStarted { total: usize },

    /// A blob began (or restarted) downloading
    BlobStarted { digest: String },

    /// A blob's percentage changed; `percent` is `None` for unknown lengths
    BlobAdvanced {
        digest: String,
        bytes: u64,
        percent: Option<u8>,
    },

    /// A blob is retrying and its progress was reset
    BlobRetrying {
        digest: String,
        attempt: u32,
        reason: String,
    },

    /// A blob finished; carries the global summary line
    BlobCompleted {
        digest: String,
        completed: usize,
        total: usize,
        elapsed: Duration,
        summary: String,
    },
}

impl ProgressEvent {
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::BatchStarted { .. } => None,
            Self::BlobStarted { digest }
            | Self::BlobAdvanced { digest, .. }
            | Self::BlobRetrying { digest, .. }
            | Self::BlobCompleted { digest, .. } => Some(digest),
        }
    }
}
