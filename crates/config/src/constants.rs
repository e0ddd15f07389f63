//! Fixed limits and default values shared by the network crate and the CLI

/// Upper bound for concurrent blob downloads
pub const MAX_THREADS: usize = 20;

/// Concurrent blob downloads when nothing else is configured
pub const DEFAULT_THREADS: usize = 5;

/// Registry used for references without an explicit host
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";

/// Statuses retried at the transport level for GET/HEAD
pub const DEFAULT_RETRY_STATUSES: [u16; 7] = [408, 416, 429, 500, 502, 503, 504];

pub const KIB: usize = 1024;
pub const MIB: usize = 1024 * KIB;

/// Default write buffer for blob bodies
pub const INIT_CHUNK_SIZE: usize = 256 * KIB;

/// Write buffer for blobs larger than [`LARGE_FILE_THRESHOLD`]
pub const LARGE_CHUNK_SIZE: usize = 2 * MIB;

pub const LARGE_FILE_THRESHOLD: u64 = 500 * 1024 * 1024;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "LAYERPULL_";
