#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! SHA-2 content hashing for layerpull
//!
//! This crate computes blob digests over files and byte slices and checks
//! them against the `<algorithm>:<hex>` digests named in manifests.

use layerpull_errors::Error;
use layerpull_types::{Digest, DigestAlgorithm};
use sha2::{Digest as _, Sha256, Sha384, Sha512};
use std::fmt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Size of chunks for streaming hash computation
const CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Incremental hasher over one of the supported algorithms
#[derive(Clone)]
pub enum Hasher {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl Hasher {
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
            DigestAlgorithm::Sha384 => Self::Sha384(Sha384::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    #[must_use]
    pub fn finalize(self) -> Hash {
        match self {
            Self::Sha256(h) => Hash::new(DigestAlgorithm::Sha256, h.finalize().to_vec()),
            Self::Sha384(h) => Hash::new(DigestAlgorithm::Sha384, h.finalize().to_vec()),
            Self::Sha512(h) => Hash::new(DigestAlgorithm::Sha512, h.finalize().to_vec()),
        }
    }
}

/// A computed content hash
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    algorithm: DigestAlgorithm,
    bytes: Vec<u8>,
}

impl Hash {
    fn new(algorithm: DigestAlgorithm, bytes: Vec<u8>) -> Self {
        Self { algorithm, bytes }
    }

    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Get the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Convert to hex string
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Whether this hash equals the given digest (algorithm and value)
    #[must_use]
    pub fn matches(&self, digest: &Digest) -> bool {
        self.algorithm == digest.algorithm() && self.to_hex() == digest.hex()
    }

    /// Compute hash of a byte slice
    #[must_use]
    pub fn from_data(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    /// Compute hash of a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(path: &Path, algorithm: DigestAlgorithm) -> Result<Self, Error> {
        let mut file = File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;

        let mut hasher = Hasher::new(algorithm);
        let mut buffer = vec![0; CHUNK_SIZE];

        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(hasher.finalize())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

/// Verify a file matches an expected digest
///
/// Returns the computed hash on success or mismatch; the caller decides how
/// to report a mismatch.
///
/// # Errors
/// Returns an error if the file cannot be read or hashed.
pub async fn verify_file(path: &Path, expected: &Digest) -> Result<(bool, Hash), Error> {
    let actual = Hash::hash_file(path, expected.algorithm()).await?;
    Ok((actual.matches(expected), actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_hash_basics() {
        let hash = Hash::from_data(DigestAlgorithm::Sha256, b"hello world");

        // Known SHA-256 of "hello world"
        let expected = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(hash.to_hex(), expected);
    }

    #[test]
    fn test_hash_lengths_follow_algorithm() {
        for algorithm in [
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            let hash = Hash::from_data(algorithm, b"x");
            assert_eq!(hash.to_hex().len(), algorithm.hex_len());
        }
    }

    #[tokio::test]
    async fn test_hash_file() {
        use std::io::Write;
        let mut temp = NamedTempFile::new().unwrap();
        let data = b"test file content";
        temp.write_all(data).unwrap();

        let hash = Hash::hash_file(temp.path(), DigestAlgorithm::Sha512)
            .await
            .unwrap();
        assert_eq!(hash, Hash::from_data(DigestAlgorithm::Sha512, data));
    }

    #[tokio::test]
    async fn test_hash_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Hash::hash_file(&dir.path().join("nope"), DigestAlgorithm::Sha256)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { path: Some(_), .. }));
    }
}
