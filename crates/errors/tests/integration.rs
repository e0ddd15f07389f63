//! Integration tests for error types

#[cfg(test)]
mod tests {
    use layerpull_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://registry.example/v2/".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.kind_label(), "network.timeout");
    }

    #[test]
    fn test_error_display() {
        let err = DownloadError::RetryBudgetExceeded {
            digest: "sha256:abc".into(),
            attempts: 3,
            kind: "network.timeout".into(),
            last_error: "connection timeout to x".into(),
        };
        assert_eq!(
            err.to_string(),
            "blob sha256:abc failed after 3 attempts (network.timeout): connection timeout to x"
        );
    }

    #[test]
    fn test_error_clone() {
        let err = AuthError::TokenRequestFailed {
            realm: "https://auth.example/token".into(),
            status: 403,
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let err: Error = io_err.into();
        assert!(matches!(
            err,
            Error::Io {
                kind: std::io::ErrorKind::PermissionDenied,
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(NetworkError::http(503, "unavailable").is_retryable());
        assert!(!NetworkError::http(404, "missing").is_retryable());
        assert!(!Error::from(ManifestError::Empty).is_retryable());
        assert!(
            AuthError::TokenRequestFailed {
                realm: "r".into(),
                status: 502
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_user_codes_are_stable() {
        let err = Error::from(DownloadError::ChecksumMismatch {
            digest: "sha256:00".into(),
            expected: "00".into(),
            actual: "11".into(),
        });
        assert_eq!(err.user_code(), Some("download.checksum_mismatch"));
        assert_eq!(Error::Cancelled.user_code(), Some("error.cancelled"));
    }
}
