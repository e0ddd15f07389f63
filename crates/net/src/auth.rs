//! Bearer token acquisition and caching
//!
//! The registry is probed at `/v2/`; a `401` carrying a `Bearer` challenge
//! sends us to the token realm with a `repository:<name>:pull` scope. Tokens
//! are cached per `(registry, repository)` and at most one exchange per key
//! is in flight at a time.

use crate::client::NetClient;
use crate::endpoint::RegistryEndpoint;
use dashmap::DashMap;
use layerpull_config::AuthConfig;
use layerpull_errors::{AuthError, Error};
use layerpull_events::{AppEvent, AuthEvent, EventEmitter, EventSender, FailureContext};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

type CacheKey = (String, String);

/// A bearer token and its lifetime
#[derive(Debug, Clone)]
pub struct AuthToken {
    value: String,
    issued_at: Instant,
    expires_at: Instant,
}

impl AuthToken {
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Usable until `expires_at - skew`
    #[must_use]
    pub fn is_fresh(&self, now: Instant, skew: Duration) -> bool {
        now + skew < self.expires_at
    }
}

#[derive(Debug, Clone)]
enum CachedAuth {
    Bearer(AuthToken),
    Anonymous {
        issued_at: Instant,
        expires_at: Instant,
    },
}

impl CachedAuth {
    fn issued_at(&self) -> Instant {
        match self {
            Self::Bearer(token) => token.issued_at,
            Self::Anonymous { issued_at, .. } => *issued_at,
        }
    }

    fn is_fresh(&self, now: Instant, skew: Duration) -> bool {
        match self {
            Self::Bearer(token) => token.is_fresh(now, skew),
            Self::Anonymous { expires_at, .. } => now < *expires_at,
        }
    }

    fn headers(&self) -> Result<AuthHeaders, AuthError> {
        match self {
            Self::Bearer(token) => AuthHeaders::bearer(&token.value),
            Self::Anonymous { .. } => Ok(AuthHeaders::anonymous()),
        }
    }
}

/// Read-only snapshot of the headers a registry request needs
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders(HeaderMap);

impl AuthHeaders {
    /// No credentials
    #[must_use]
    pub fn anonymous() -> Self {
        Self(HeaderMap::new())
    }

    /// `Authorization: Bearer <token>`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidTokenResponse` if the token is not a valid
    /// header value.
    pub fn bearer(token: &str) -> Result<Self, AuthError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            AuthError::InvalidTokenResponse {
                message: format!("token is not a valid header value: {e}"),
            }
        })?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(Self(headers))
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        !self.0.contains_key(AUTHORIZATION)
    }

    #[must_use]
    pub fn header_map(&self) -> &HeaderMap {
        &self.0
    }

    /// Owned copy to extend with per-request headers
    #[must_use]
    pub fn to_header_map(&self) -> HeaderMap {
        self.0.clone()
    }
}

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

/// Parse a `WWW-Authenticate` header value.
///
/// Quoted values may contain commas and backslash escapes.
///
/// # Errors
///
/// Returns `AuthError::UnsupportedScheme` for non-bearer challenges and
/// `AuthError::MalformedChallenge` when `realm` is missing.
pub fn parse_challenge(header: &str) -> Result<BearerChallenge, AuthError> {
    let header = header.trim();
    let (scheme, rest) = header
        .split_once(char::is_whitespace)
        .unwrap_or((header, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::UnsupportedScheme {
            scheme: scheme.to_string(),
        });
    }

    let mut params = parse_params(rest);
    let realm = params
        .remove("realm")
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AuthError::MalformedChallenge {
            parameter: "realm".to_string(),
        })?;

    Ok(BearerChallenge {
        realm,
        service: params.remove("service").filter(|s| !s.is_empty()),
        scope: params.remove("scope").filter(|s| !s.is_empty()),
    })
}

fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| *c == ',' || c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            // bare token without a value
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim().to_string();
        }

        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            params.insert(key, value);
        }
    }
    params
}

/// Scope requested for pulling `repository`
#[must_use]
pub fn pull_scope(repository: &str) -> String {
    format!("repository:{repository}:pull")
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Token cache with per-key single-flight refresh
pub struct TokenManager {
    cache: Mutex<HashMap<CacheKey, CachedAuth>>,
    gates: DashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>,
    skew: Duration,
    default_ttl: Duration,
    tx: Option<EventSender>,
}

impl TokenManager {
    #[must_use]
    pub fn new(config: &AuthConfig, tx: Option<EventSender>) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            gates: DashMap::new(),
            skew: Duration::from_secs(config.token_skew),
            default_ttl: Duration::from_secs(config.default_token_ttl),
            tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CachedAuth>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Headers for requests against `repository` on `endpoint`.
    ///
    /// Without `force_refresh` a cached token is returned while
    /// `now + skew < expires_at`. Callers that were waiting while another
    /// task refreshed the same key reuse that result, forced or not.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the probe or token exchange fails;
    /// the cached entry is left as it was.
    pub async fn acquire(
        &self,
        session: &NetClient,
        endpoint: &RegistryEndpoint,
        repository: &str,
        force_refresh: bool,
    ) -> Result<AuthHeaders, Error> {
        let key: CacheKey = (endpoint.name().to_string(), repository.to_string());
        let requested_at = Instant::now();

        if !force_refresh {
            if let Some(headers) = self.reusable(&key, |entry| entry.is_fresh(Instant::now(), self.skew)) {
                self.emit_reused(&key);
                return Ok(headers);
            }
        }

        let gate = Arc::clone(&*self.gates.entry(key.clone()).or_default());
        let _in_flight = gate.lock().await;

        if let Some(headers) = self.reusable(&key, |entry| {
            entry.issued_at() >= requested_at
                || (!force_refresh && entry.is_fresh(Instant::now(), self.skew))
        }) {
            self.emit_reused(&key);
            return Ok(headers);
        }

        let fetched = match self.exchange(session, endpoint, repository).await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.emit(AppEvent::Auth(AuthEvent::Failed {
                    registry: key.0.clone(),
                    repository: key.1.clone(),
                    failure: FailureContext::from_error(&err),
                }));
                return Err(err.into());
            }
        };
        let headers = fetched.headers()?;

        let event = match &fetched {
            CachedAuth::Bearer(token) => AuthEvent::TokenAcquired {
                registry: key.0.clone(),
                repository: key.1.clone(),
                expires_in: token
                    .expires_at
                    .saturating_duration_since(token.issued_at)
                    .as_secs(),
                forced: force_refresh,
            },
            CachedAuth::Anonymous { .. } => AuthEvent::Anonymous {
                registry: key.0.clone(),
                repository: key.1.clone(),
            },
        };
        self.lock().insert(key, fetched);
        self.emit(AppEvent::Auth(event));
        Ok(headers)
    }

    /// Currently cached bearer token, if any
    #[must_use]
    pub fn cached_token(&self, endpoint: &RegistryEndpoint, repository: &str) -> Option<AuthToken> {
        let key = (endpoint.name().to_string(), repository.to_string());
        match self.lock().get(&key) {
            Some(CachedAuth::Bearer(token)) => Some(token.clone()),
            _ => None,
        }
    }

    fn reusable(
        &self,
        key: &CacheKey,
        accept: impl Fn(&CachedAuth) -> bool,
    ) -> Option<AuthHeaders> {
        let cache = self.lock();
        let entry = cache.get(key).filter(|entry| accept(entry))?;
        entry.headers().ok()
    }

    fn emit_reused(&self, key: &CacheKey) {
        self.emit(AppEvent::Auth(AuthEvent::TokenReused {
            registry: key.0.clone(),
            repository: key.1.clone(),
        }));
    }

    async fn exchange(
        &self,
        session: &NetClient,
        endpoint: &RegistryEndpoint,
        repository: &str,
    ) -> Result<CachedAuth, AuthError> {
        let probe = session
            .get(&endpoint.api_root(), &HeaderMap::new())
            .await
            .map_err(|e| AuthError::ProbeFailed {
                registry: endpoint.name().to_string(),
                message: e.to_string(),
            })?;

        if probe.status() != StatusCode::UNAUTHORIZED {
            tracing::debug!(
                registry = endpoint.name(),
                status = probe.status().as_u16(),
                "registry did not issue a challenge, pulling anonymously"
            );
            let issued_at = Instant::now();
            return Ok(CachedAuth::Anonymous {
                issued_at,
                expires_at: issued_at + self.default_ttl,
            });
        }

        let header = probe
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::MalformedChallenge {
                parameter: "WWW-Authenticate".to_string(),
            })?;
        let challenge = parse_challenge(header)?;
        drop(probe);

        let realm = challenge.realm;
        let service = challenge
            .service
            .unwrap_or_else(|| endpoint.name().to_string());
        let mut token_url = Url::parse(&realm).map_err(|e| AuthError::TokenTransportFailed {
            realm: realm.clone(),
            message: e.to_string(),
        })?;
        token_url
            .query_pairs_mut()
            .append_pair("service", &service)
            .append_pair("scope", &pull_scope(repository));

        let response = session
            .get(token_url.as_str(), &HeaderMap::new())
            .await
            .map_err(|e| AuthError::TokenTransportFailed {
                realm: realm.clone(),
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(AuthError::TokenRequestFailed {
                realm,
                status: response.status().as_u16(),
            });
        }

        let body: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::InvalidTokenResponse {
                    message: e.to_string(),
                })?;
        let value = body
            .token
            .filter(|t| !t.is_empty())
            .or(body.access_token.filter(|t| !t.is_empty()))
            .ok_or_else(|| AuthError::InvalidTokenResponse {
                message: "response has neither token nor access_token".to_string(),
            })?;
        let ttl = body
            .expires_in
            .map_or(self.default_ttl, Duration::from_secs);

        let issued_at = Instant::now();
        tracing::debug!(
            registry = endpoint.name(),
            repository,
            ttl_secs = ttl.as_secs(),
            "acquired registry token"
        );
        Ok(CachedAuth::Bearer(AuthToken {
            value,
            issued_at,
            expires_at: issued_at + ttl,
        }))
    }
}

impl EventEmitter for TokenManager {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_docker_hub_challenge() {
        let challenge = parse_challenge(
            r#"Bearer realm="https://auth.docker.io/token",service="registry.docker.io",scope="repository:library/alpine:pull""#,
        )
        .unwrap();
        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service.as_deref(), Some("registry.docker.io"));
        assert_eq!(
            challenge.scope.as_deref(),
            Some("repository:library/alpine:pull")
        );
    }

    #[test]
    fn quoted_values_keep_commas() {
        let challenge = parse_challenge(
            r#"bearer realm="https://r.example/token", scope="repository:a:pull,push", service=reg"#,
        )
        .unwrap();
        assert_eq!(challenge.scope.as_deref(), Some("repository:a:pull,push"));
        assert_eq!(challenge.service.as_deref(), Some("reg"));
    }

    #[test]
    fn escaped_quotes_are_unescaped() {
        let challenge = parse_challenge(r#"Bearer realm="https://x/\"t\"""#).unwrap();
        assert_eq!(challenge.realm, r#"https://x/"t""#);
        assert_eq!(challenge.service, None);
    }

    #[test]
    fn non_bearer_and_missing_realm_are_rejected() {
        assert!(matches!(
            parse_challenge(r#"Basic realm="registry""#),
            Err(AuthError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            parse_challenge(r#"Bearer service="x""#),
            Err(AuthError::MalformedChallenge { .. })
        ));
    }

    #[test]
    fn token_freshness_respects_skew() {
        let now = Instant::now();
        let token = AuthToken {
            value: "t".into(),
            issued_at: now,
            expires_at: now + Duration::from_secs(60),
        };
        assert!(token.is_fresh(now, Duration::from_secs(30)));
        assert!(!token.is_fresh(now + Duration::from_secs(31), Duration::from_secs(30)));
    }

    #[test]
    fn bearer_headers_are_not_anonymous() {
        let headers = AuthHeaders::bearer("abc").unwrap();
        assert!(!headers.is_anonymous());
        assert_eq!(headers.header_map()[AUTHORIZATION], "Bearer abc");
        assert!(AuthHeaders::anonymous().is_anonymous());
    }
}
