//! Content digests in `<algorithm>:<hex>` form

use layerpull_errors::DownloadError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Hash algorithms accepted in blob digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Algorithm name as it appears in a digest string
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Number of hex characters in an encoded digest of this algorithm
    #[must_use]
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha384 => 96,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(DownloadError::UnsupportedAlgorithm {
                algorithm: other.to_string(),
            }),
        }
    }
}

/// A validated blob digest.
///
/// The hex part is always lowercase and exactly as long as the algorithm
/// requires, so two equal blobs always compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Digest {
    /// Build a digest from parts, validating the hex encoding
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::InvalidDigest` if `hex` has the wrong length
    /// or contains anything other than lowercase hex characters.
    pub fn new(algorithm: DigestAlgorithm, hex: impl Into<String>) -> Result<Self, DownloadError> {
        let hex = hex.into();
        let invalid = |reason: String| DownloadError::InvalidDigest {
            value: format!("{algorithm}:{hex}"),
            reason,
        };

        if hex.len() != algorithm.hex_len() {
            return Err(invalid(format!(
                "expected {} hex characters, found {}",
                algorithm.hex_len(),
                hex.len()
            )));
        }
        if !hex
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(invalid("hex must be lowercase [0-9a-f]".to_string()));
        }

        Ok(Self { algorithm, hex })
    }

    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Shortened form for progress lines (`sha256:0123456789ab`)
    #[must_use]
    pub fn short(&self) -> String {
        let end = self.hex.len().min(12);
        format!("{}:{}", self.algorithm, &self.hex[..end])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex) = s.split_once(':').ok_or_else(|| DownloadError::InvalidDigest {
            value: s.to_string(),
            reason: "missing ':' separator".to_string(),
        })?;
        Self::new(algorithm.parse()?, hex)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
