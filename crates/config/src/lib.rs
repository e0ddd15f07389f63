#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for layerpull
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/layerpull/config.toml)
//! - Environment variables (`LAYERPULL_*`)
//! - CLI flags (applied by the binary)

pub mod constants;
pub mod sections;

pub use constants::MAX_THREADS;
pub use sections::{AuthConfig, DownloadConfig, GeneralConfig, NetworkConfig};

use layerpull_errors::{ConfigError, Error};
use layerpull_types::{ColorChoice, OutputFormat, Platform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("layerpull").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading config file");
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // LAYERPULL_OUTPUT
        if let Some(output) = env_var("OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => return Err(invalid("LAYERPULL_OUTPUT", output)),
            };
        }

        // LAYERPULL_COLOR
        if let Some(color) = env_var("COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => return Err(invalid("LAYERPULL_COLOR", color)),
            };
        }

        // LAYERPULL_THREADS
        if let Some(threads) = env_var("THREADS") {
            self.general.concurrency = threads
                .parse()
                .map_err(|_| invalid("LAYERPULL_THREADS", threads))?;
        }

        if let Some(dir) = env_var("OUTPUT_DIR") {
            self.general.output_dir = PathBuf::from(dir);
        }

        if let Some(registry) = env_var("REGISTRY") {
            self.general.registry = registry;
        }

        if let Some(os) = env_var("OS") {
            self.general.os = os;
        }

        if let Some(arch) = env_var("ARCH") {
            self.general.architecture = arch;
        }

        // LAYERPULL_INSECURE
        if let Some(insecure) = env_var("INSECURE") {
            self.network.insecure = match insecure.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(invalid("LAYERPULL_INSECURE", insecure)),
            };
        }

        // LAYERPULL_MAX_ATTEMPTS
        if let Some(attempts) = env_var("MAX_ATTEMPTS") {
            self.download.max_attempts = attempts
                .parse()
                .map_err(|_| invalid("LAYERPULL_MAX_ATTEMPTS", attempts))?;
        }

        Ok(())
    }

    /// Reject values the downloader cannot work with
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.general.registry.trim().is_empty() {
            return Err(invalid("general.registry", String::new()));
        }
        if self.download.max_attempts == 0 {
            return Err(invalid("download.max_attempts", "0".to_string()));
        }
        if self.download.backoff_base.is_nan() || self.download.backoff_base <= 0.0 {
            return Err(invalid(
                "download.backoff_base",
                self.download.backoff_base.to_string(),
            ));
        }
        if self.download.jitter_min < 0.0 || self.download.jitter_min > self.download.jitter_max {
            return Err(invalid(
                "download.jitter_min",
                format!("{}..{}", self.download.jitter_min, self.download.jitter_max),
            ));
        }
        if self.download.chunk_size == 0 || self.download.large_chunk_size == 0 {
            return Err(invalid("download.chunk_size", "0".to_string()));
        }
        if self.network.connect_timeout == 0 || self.network.read_timeout == 0 {
            return Err(invalid("network.timeout", "0".to_string()));
        }
        if let Some(status) = self
            .network
            .retry_statuses
            .iter()
            .find(|s| !(100..600).contains(*s))
        {
            return Err(invalid("network.retry_statuses", status.to_string()));
        }
        Ok(())
    }

    /// Platform selected for manifest lists
    #[must_use]
    pub fn platform(&self) -> Platform {
        Platform::new(&self.general.os, &self.general.architecture)
            .with_variant(self.general.variant.clone())
    }

    /// Concurrency clamped to the supported range
    #[must_use]
    pub fn concurrency(&self) -> usize {
        clamp_concurrency(self.general.concurrency)
    }
}

/// Clamp a requested worker count to `[1, MAX_THREADS]`
#[must_use]
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_THREADS)
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}{suffix}", constants::ENV_PREFIX)).ok()
}

fn invalid(field: &str, value: String) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
    }
    .into()
}
