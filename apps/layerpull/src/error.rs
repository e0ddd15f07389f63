//! CLI error handling

use std::fmt;

use layerpull_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration error
    Config(layerpull_errors::ConfigError),
    /// Pull error
    Pull(layerpull_errors::Error),
    /// Interrupted by the user
    Interrupted,
    /// Invalid command arguments
    InvalidArguments(String),
    /// I/O error
    Io(std::io::Error),
}

impl CliError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Interrupted => 130,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {e}"),
            CliError::Pull(e) => {
                let message = e.user_message();
                write!(f, "{message}")?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::Interrupted => write!(f, "Interrupted"),
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Pull(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<layerpull_errors::ConfigError> for CliError {
    fn from(e: layerpull_errors::ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<layerpull_errors::Error> for CliError {
    fn from(e: layerpull_errors::Error) -> Self {
        match e {
            layerpull_errors::Error::Config(config) => CliError::Config(config),
            layerpull_errors::Error::Cancelled => CliError::Interrupted,
            other => CliError::Pull(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerpull_errors::DownloadError;

    #[test]
    fn cancellation_maps_to_interrupt_status() {
        let err = CliError::from(layerpull_errors::Error::Cancelled);
        assert_eq!(err.exit_code(), 130);
    }

    #[test]
    fn pull_errors_render_code_and_hint() {
        let err = CliError::from(layerpull_errors::Error::from(
            DownloadError::RetryBudgetExceeded {
                digest: "sha256:ab".to_string(),
                attempts: 3,
                kind: "network.timeout".to_string(),
                last_error: "timed out".to_string(),
            },
        ));
        let text = err.to_string();
        assert_eq!(err.exit_code(), 1);
        assert!(text.contains("sha256:ab"));
        assert!(text.contains("Code: download.retry_budget_exceeded"));
        assert!(text.contains("Hint:"));
    }
}
