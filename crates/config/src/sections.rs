//! Configuration sections

use crate::constants::{
    DEFAULT_REGISTRY, DEFAULT_RETRY_STATUSES, DEFAULT_THREADS, INIT_CHUNK_SIZE, LARGE_CHUNK_SIZE,
    LARGE_FILE_THRESHOLD,
};
use layerpull_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
    /// Concurrent blob downloads, clamped to `[1, MAX_THREADS]` at run time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_registry")]
    pub registry: String,
    #[serde(default = "default_os")]
    pub os: String,
    #[serde(default = "default_architecture")]
    pub architecture: String,
    #[serde(default)]
    pub variant: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
            concurrency: DEFAULT_THREADS,
            output_dir: default_output_dir(),
            registry: DEFAULT_REGISTRY.to_string(),
            os: default_os(),
            architecture: default_architecture(),
            variant: None,
        }
    }
}

/// Connection and transport-retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    /// Applies to the response-header wait and to every body chunk
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64, // seconds
    #[serde(default = "default_session_refresh")]
    pub session_refresh_interval: u64, // seconds
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout: u64, // seconds
    #[serde(default = "default_transport_retries")]
    pub transport_retries: u32,
    #[serde(default = "default_transport_backoff_base")]
    pub transport_backoff_base: f64, // seconds
    #[serde(default = "default_transport_backoff_max")]
    pub transport_backoff_max: f64, // seconds
    #[serde(default = "default_max_retry_after")]
    pub max_retry_after: u64, // seconds
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            session_refresh_interval: default_session_refresh(),
            pool_max_idle_per_host: default_pool_max_idle(),
            pool_idle_timeout: default_pool_idle_timeout(),
            transport_retries: default_transport_retries(),
            transport_backoff_base: default_transport_backoff_base(),
            transport_backoff_max: default_transport_backoff_max(),
            max_retry_after: default_max_retry_after(),
            retry_statuses: default_retry_statuses(),
            insecure: false,
            user_agent: default_user_agent(),
        }
    }
}

/// Per-blob retry and buffering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Total tries per blob before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before retry n is `backoff_base ^ n` seconds times jitter
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,
    #[serde(default = "default_jitter_min")]
    pub jitter_min: f64,
    #[serde(default = "default_jitter_max")]
    pub jitter_max: f64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff: f64, // seconds
    /// Cap on 401/416 reset cycles per blob
    #[serde(default = "default_max_resets")]
    pub max_resets: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_large_chunk_size")]
    pub large_chunk_size: usize,
    #[serde(default = "default_large_file_threshold")]
    pub large_file_threshold: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base: default_backoff_base(),
            jitter_min: default_jitter_min(),
            jitter_max: default_jitter_max(),
            max_backoff: default_max_backoff(),
            max_resets: default_max_resets(),
            chunk_size: INIT_CHUNK_SIZE,
            large_chunk_size: LARGE_CHUNK_SIZE,
            large_file_threshold: LARGE_FILE_THRESHOLD,
        }
    }
}

/// Bearer token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Tokens are refreshed this long before they expire
    #[serde(default = "default_token_skew")]
    pub token_skew: u64, // seconds
    /// Lifetime assumed when the token response has no `expires_in`
    #[serde(default = "default_token_ttl")]
    pub default_token_ttl: u64, // seconds
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_skew: default_token_skew(),
            default_token_ttl: default_token_ttl(),
        }
    }
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_concurrency() -> usize {
    DEFAULT_THREADS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

fn default_os() -> String {
    "linux".to_string()
}

fn default_architecture() -> String {
    "amd64".to_string()
}

fn default_connect_timeout() -> u64 {
    600 // 10 minutes
}

fn default_read_timeout() -> u64 {
    7200 // 2 hours
}

fn default_session_refresh() -> u64 {
    300
}

fn default_pool_max_idle() -> usize {
    50
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_transport_retries() -> u32 {
    5
}

fn default_transport_backoff_base() -> f64 {
    1.0
}

fn default_transport_backoff_max() -> f64 {
    120.0
}

fn default_max_retry_after() -> u64 {
    300
}

fn default_retry_statuses() -> Vec<u16> {
    DEFAULT_RETRY_STATUSES.to_vec()
}

fn default_user_agent() -> String {
    format!("layerpull/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    20
}

fn default_backoff_base() -> f64 {
    5.0
}

fn default_jitter_min() -> f64 {
    0.5
}

fn default_jitter_max() -> f64 {
    1.5
}

fn default_max_backoff() -> f64 {
    600.0
}

fn default_max_resets() -> u32 {
    10
}

fn default_chunk_size() -> usize {
    INIT_CHUNK_SIZE
}

fn default_large_chunk_size() -> usize {
    LARGE_CHUNK_SIZE
}

fn default_large_file_threshold() -> u64 {
    LARGE_FILE_THRESHOLD
}

fn default_token_skew() -> u64 {
    30
}

fn default_token_ttl() -> u64 {
    3600
}
