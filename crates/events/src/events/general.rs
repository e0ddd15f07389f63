use serde::{Deserialize, Serialize};

/// Warnings and operation lifecycle not tied to one blob
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeneralEvent {
    /// Something the user should know about that does not stop the pull
    Warning {
        message: String,
        context: Option<String>,
    },

    OperationStarted { operation: String },

    OperationCompleted { operation: String, success: bool },

    OperationFailed { operation: String, error: String },
}

impl GeneralEvent {
    #[must_use]
    pub fn warning(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Warning {
            message: message.into(),
            context: Some(context.into()),
        }
    }
}
