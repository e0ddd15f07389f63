use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Registry authentication events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AuthEvent {
    /// The registry accepted unauthenticated requests
    Anonymous { registry: String, repository: String },

    /// A new bearer token was obtained
    TokenAcquired {
        registry: String,
        repository: String,
        expires_in: u64,
        forced: bool,
    },

    /// A cached token was still valid
    TokenReused { registry: String, repository: String },

    /// The token exchange failed; the previous cache entry is kept
    Failed {
        registry: String,
        repository: String,
        failure: FailureContext,
    },
}

impl AuthEvent {
    /// `registry/repository` key the event refers to
    #[must_use]
    pub fn scope_key(&self) -> String {
        match self {
            Self::Anonymous {
                registry,
                repository,
            }
            | Self::TokenAcquired {
                registry,
                repository,
                ..
            }
            | Self::TokenReused {
                registry,
                repository,
            }
            | Self::Failed {
                registry,
                repository,
                ..
            } => format!("{registry}/{repository}"),
        }
    }
}
