//! Integration tests for config

#[cfg(test)]
mod tests {
    use layerpull_config::*;
    use layerpull_types::{ColorChoice, OutputFormat};
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for name in [
            "LAYERPULL_OUTPUT",
            "LAYERPULL_COLOR",
            "LAYERPULL_THREADS",
            "LAYERPULL_INSECURE",
            "LAYERPULL_REGISTRY",
        ] {
            std::env::remove_var(name);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[general]
default_output = "plain"
concurrency = 8
color = "never"
registry = "mirror.example:5000"
architecture = "arm64"
variant = "v8"

[network]
read_timeout = 30
retry_statuses = [429, 503]

[download]
max_attempts = 4
backoff_base = 2.0
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.general.default_output, OutputFormat::Plain);
        assert_eq!(config.general.concurrency, 8);
        assert_eq!(config.general.color, ColorChoice::Never);
        assert_eq!(config.general.registry, "mirror.example:5000");
        assert_eq!(config.platform().to_string(), "linux/arm64/v8");
        assert_eq!(config.network.read_timeout, 30);
        assert_eq!(config.network.connect_timeout, 600);
        assert_eq!(config.network.retry_statuses, vec![429, 503]);
        assert_eq!(config.download.max_attempts, 4);
        assert_eq!(config.download.max_resets, 10);
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(&dir.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            layerpull_errors::Error::Config(layerpull_errors::ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.general.concurrency, 5);
        assert_eq!(config.general.registry, "registry-1.docker.io");
        assert_eq!(config.download.max_attempts, 20);
        assert!((config.download.backoff_base - 5.0).abs() < f64::EPSILON);
        assert_eq!(
            config.network.retry_statuses,
            vec![408, 416, 429, 500, 502, 503, 504]
        );
        assert_eq!(config.auth.token_skew, 30);
        config.validate().unwrap();
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("LAYERPULL_OUTPUT", "json");
        std::env::set_var("LAYERPULL_COLOR", "always");
        std::env::set_var("LAYERPULL_THREADS", "12");
        std::env::set_var("LAYERPULL_INSECURE", "yes");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.general.default_output, OutputFormat::Json);
        assert_eq!(config.general.color, ColorChoice::Always);
        assert_eq!(config.general.concurrency, 12);
        assert!(config.network.insecure);

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("LAYERPULL_THREADS", "many");

        let mut config = Config::default();
        let result = config.merge_env();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    fn test_validate_rejects_nonsense() {
        let mut config = Config::default();
        config.download.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.download.jitter_min = 2.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.network.retry_statuses.push(99);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_concurrency_clamped() {
        assert_eq!(clamp_concurrency(0), 1);
        assert_eq!(clamp_concurrency(7), 7);
        assert_eq!(clamp_concurrency(64), MAX_THREADS);
    }
}
