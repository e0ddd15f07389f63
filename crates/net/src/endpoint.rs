//! Registry addressing

use layerpull_errors::{Error, NetworkError};
use layerpull_types::Digest;
use std::fmt;
use url::Url;

/// Validate URL and check for supported protocols
///
/// # Errors
///
/// Returns `NetworkError::InvalidUrl` for unparsable input and
/// `NetworkError::UnsupportedProtocol` for schemes other than http(s).
pub fn validate_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(NetworkError::UnsupportedProtocol {
            protocol: scheme.to_string(),
        }
        .into()),
    }
}

/// Base address of a registry speaking the distribution API
///
/// Bare host names use https. An explicit `http://` prefix is honoured for
/// local registries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryEndpoint {
    origin: String,
    name: String,
}

impl RegistryEndpoint {
    /// Parse a registry given as `host[:port]` or a full URL
    ///
    /// # Errors
    ///
    /// Returns a network error if the address is not a valid http(s) origin.
    pub fn parse(registry: &str) -> Result<Self, Error> {
        let registry = registry.trim().trim_end_matches('/');
        let candidate = if registry.contains("://") {
            registry.to_string()
        } else {
            format!("https://{registry}")
        };
        let url = validate_url(&candidate)?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| NetworkError::InvalidUrl(format!("{registry}: missing host")))?;

        let name = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self {
            origin: format!("{}://{name}", url.scheme()),
            name,
        })
    }

    /// `host[:port]`, the default token service and cache key
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when requests go out without TLS
    #[must_use]
    pub fn is_plain_http(&self) -> bool {
        self.origin.starts_with("http://")
    }

    /// The `/v2/` probe URL
    #[must_use]
    pub fn api_root(&self) -> String {
        format!("{}/v2/", self.origin)
    }

    #[must_use]
    pub fn blob_url(&self, repository: &str, digest: &Digest) -> String {
        format!("{}/v2/{repository}/blobs/{digest}", self.origin)
    }

    #[must_use]
    pub fn manifest_url(&self, repository: &str, reference: &str) -> String {
        format!("{}/v2/{repository}/manifests/{reference}", self.origin)
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerpull_types::DigestAlgorithm;

    #[test]
    fn bare_host_defaults_to_https() {
        let endpoint = RegistryEndpoint::parse("registry-1.docker.io").unwrap();
        assert_eq!(endpoint.name(), "registry-1.docker.io");
        assert_eq!(endpoint.api_root(), "https://registry-1.docker.io/v2/");
        assert!(!endpoint.is_plain_http());
    }

    #[test]
    fn explicit_scheme_and_port_are_kept() {
        let endpoint = RegistryEndpoint::parse("http://127.0.0.1:5000/").unwrap();
        assert!(endpoint.is_plain_http());
        assert_eq!(endpoint.name(), "127.0.0.1:5000");
        let digest = Digest::new(DigestAlgorithm::Sha256, "a".repeat(64)).unwrap();
        assert_eq!(
            endpoint.blob_url("library/alpine", &digest),
            format!("http://127.0.0.1:5000/v2/library/alpine/blobs/sha256:{}", "a".repeat(64))
        );
        assert_eq!(
            endpoint.manifest_url("library/alpine", "3.20"),
            "http://127.0.0.1:5000/v2/library/alpine/manifests/3.20"
        );
    }

    #[test]
    fn rejects_other_protocols() {
        assert!(matches!(
            RegistryEndpoint::parse("ftp://example.com"),
            Err(Error::Network(NetworkError::UnsupportedProtocol { .. }))
        ));
    }
}
