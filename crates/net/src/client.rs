//! HTTP client with connection pooling and retry logic

use layerpull_config::Config;
use layerpull_errors::{Error, NetworkError};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub connect_timeout: Duration,
    /// Bound on the wait for response headers and for every body chunk
    pub read_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Transport-level retries for idempotent requests
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    /// Upper bound applied to server supplied `Retry-After` values
    pub max_retry_after: Duration,
    pub retry_statuses: Vec<u16>,
    pub session_refresh_interval: Duration,
    pub insecure: bool,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for NetConfig {
    fn from(config: &Config) -> Self {
        let network = &config.network;
        Self {
            connect_timeout: Duration::from_secs(network.connect_timeout),
            read_timeout: Duration::from_secs(network.read_timeout),
            pool_idle_timeout: Duration::from_secs(network.pool_idle_timeout),
            pool_max_idle_per_host: network.pool_max_idle_per_host,
            retry_count: network.transport_retries,
            retry_delay: secs_f64(network.transport_backoff_base),
            max_retry_delay: secs_f64(network.transport_backoff_max),
            max_retry_after: Duration::from_secs(network.max_retry_after),
            retry_statuses: network.retry_statuses.clone(),
            session_refresh_interval: Duration::from_secs(network.session_refresh_interval),
            insecure: network.insecure,
            user_agent: network.user_agent.clone(),
        }
    }
}

pub(crate) fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// HTTP client wrapper with retry logic
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone, Debug)]
pub struct NetClient {
    client: Client,
    config: Arc<NetConfig>,
    /// Aborts in-flight requests and retry sleeps
    cancel: CancellationToken,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created due to invalid configuration
    /// or if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| NetworkError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
        })
    }

    /// Stop requests and retry backoff once `cancel` fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute a GET request with retries
    ///
    /// A response whose status is on the retry list is returned once retries
    /// are used up, so callers still get to inspect it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts, including
    /// network timeouts and connection failures.
    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Response, Error> {
        self.retry_request(Method::GET, url, headers).await
    }

    /// Execute a HEAD request with retries
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after all retry attempts, including
    /// network timeouts and connection failures.
    pub async fn head(&self, url: &str, headers: &HeaderMap) -> Result<Response, Error> {
        self.retry_request(Method::HEAD, url, headers).await
    }

    /// Execute an idempotent request with retries
    ///
    /// Returns `Error::Cancelled` as soon as the cancellation token fires,
    /// including while waiting out a backoff.
    async fn retry_request(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Response, Error> {
        let mut attempt = 0u32;

        loop {
            let request = self
                .client
                .request(method.clone(), url)
                .headers(headers.clone());
            let outcome = tokio::select! {
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                outcome = tokio::time::timeout(self.config.read_timeout, request.send()) => outcome,
            };
            let retries_left = attempt < self.config.retry_count;

            let delay = match outcome {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if !retries_left || !self.is_retry_status(status) {
                        return Ok(response);
                    }
                    let delay = self
                        .retry_after(&response)
                        .unwrap_or_else(|| self.backoff(attempt + 1));
                    tracing::debug!(
                        %url,
                        status = status.as_u16(),
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying request after status"
                    );
                    delay
                }
                Ok(Err(e)) => {
                    if !retries_left || !Self::should_retry(&e) {
                        return Err(classify_error(&e, url).into());
                    }
                    tracing::debug!(%url, error = %e, attempt = attempt + 1, "retrying request after transport error");
                    self.backoff(attempt + 1)
                }
                Err(_) => {
                    if !retries_left {
                        return Err(NetworkError::Timeout {
                            url: url.to_string(),
                        }
                        .into());
                    }
                    tracing::debug!(%url, attempt = attempt + 1, "retrying request after header timeout");
                    self.backoff(attempt + 1)
                }
            };

            attempt += 1;
            tokio::select! {
                () = self.cancel.cancelled() => return Err(Error::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn is_retry_status(&self, status: StatusCode) -> bool {
        self.config.retry_statuses.contains(&status.as_u16())
    }

    /// Integer `Retry-After`, capped
    fn retry_after(&self, response: &Response) -> Option<Duration> {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(self.config.max_retry_after))
    }

    /// `retry_delay * 2^(n-1)`, capped
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.config
            .retry_delay
            .saturating_mul(factor)
            .min(self.config.max_retry_delay)
    }

    /// Determine if an error should be retried
    fn should_retry(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    #[must_use]
    pub fn config(&self) -> &NetConfig {
        &self.config
    }
}

/// Map a reqwest failure onto the network error taxonomy
pub(crate) fn classify_error(error: &reqwest::Error, url: &str) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        NetworkError::ConnectionFailed(error.to_string())
    } else if error.is_builder() {
        NetworkError::InvalidUrl(format!("{url}: {error}"))
    } else {
        NetworkError::TransportFailed(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NetConfig {
        NetConfig {
            retry_count: 3,
            retry_delay: Duration::from_millis(100),
            max_retry_delay: Duration::from_millis(250),
            ..NetConfig::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let client = NetClient::new(config()).unwrap();
        assert_eq!(client.backoff(1), Duration::from_millis(100));
        assert_eq!(client.backoff(2), Duration::from_millis(200));
        assert_eq!(client.backoff(3), Duration::from_millis(250));
        assert_eq!(client.backoff(40), Duration::from_millis(250));
    }

    #[test]
    fn defaults_follow_config_file_defaults() {
        let net = NetConfig::default();
        assert_eq!(net.connect_timeout, Duration::from_secs(600));
        assert_eq!(net.read_timeout, Duration::from_secs(7200));
        assert_eq!(net.session_refresh_interval, Duration::from_secs(300));
        assert!(net.retry_statuses.contains(&416));
        assert!(net.retry_statuses.contains(&429));
    }
}
