//! Configuration and per-blob attempt bookkeeping

use crate::client::secs_f64;
use layerpull_config::Config;
use layerpull_errors::Error;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the per-blob state machine
#[derive(Debug, Clone)]
pub struct BlobDownloadConfig {
    /// Root under which `<repo>_layers/` is created
    pub output_dir: PathBuf,
    /// Total tries per blob before giving up
    pub max_attempts: u32,
    pub backoff_base: f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub max_backoff: Duration,
    /// Cap on 401/416 restarts, which do not consume attempts
    pub max_resets: u32,
    pub chunk_size: usize,
    pub large_chunk_size: usize,
    pub large_file_threshold: u64,
    /// Per-chunk read timeout while streaming
    pub read_timeout: Duration,
}

impl Default for BlobDownloadConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for BlobDownloadConfig {
    fn from(config: &Config) -> Self {
        let download = &config.download;
        Self {
            output_dir: config.general.output_dir.clone(),
            max_attempts: download.max_attempts,
            backoff_base: download.backoff_base,
            jitter_min: download.jitter_min,
            jitter_max: download.jitter_max,
            max_backoff: secs_f64(download.max_backoff),
            max_resets: download.max_resets,
            chunk_size: download.chunk_size,
            large_chunk_size: download.large_chunk_size,
            large_file_threshold: download.large_file_threshold,
            read_timeout: Duration::from_secs(config.network.read_timeout),
        }
    }
}

impl BlobDownloadConfig {
    /// Write buffer size for a body of the given declared length
    #[must_use]
    pub fn buffer_size(&self, declared_total: Option<u64>) -> usize {
        match declared_total {
            Some(total) if total > self.large_file_threshold => self.large_chunk_size,
            _ => self.chunk_size,
        }
    }
}

/// Mutable state of one blob, owned by its worker
#[derive(Debug, Clone, Default)]
pub struct DownloadAttemptState {
    pub bytes_on_disk: u64,
    pub attempt_count: u32,
    pub reset_count: u32,
    /// Faults seen so far, keyed by stable error code
    pub error_counts: BTreeMap<&'static str, u32>,
}

impl DownloadAttemptState {
    /// Count a budget-consuming failure and return the new attempt count
    pub fn record_fault(&mut self, error: &Error) -> u32 {
        self.attempt_count += 1;
        *self.error_counts.entry(error.kind_label()).or_insert(0) += 1;
        self.attempt_count
    }

    /// Total faults across all kinds
    #[must_use]
    pub fn total_faults(&self) -> u32 {
        self.error_counts.values().sum()
    }
}

/// Outcome of a single attempt that did not produce a verified file
#[derive(Debug)]
pub enum AttemptError {
    /// The registry rejected our credentials
    Unauthorized,
    /// The resume offset was refused with 416
    RangeNotSatisfiable,
    /// Anything that consumes retry budget
    Fault(Error),
}

impl From<Error> for AttemptError {
    fn from(err: Error) -> Self {
        Self::Fault(err)
    }
}
