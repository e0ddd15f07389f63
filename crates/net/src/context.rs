//! Pull context for dependency injection

use crate::auth::TokenManager;
use crate::blob::BlobDownloadConfig;
use crate::client::NetConfig;
use crate::connection::ConnectionManager;
use layerpull_config::{clamp_concurrency, Config};
use layerpull_errors::Error;
use layerpull_events::{EventEmitter, EventSender, ProgressAggregator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a pull shares between its workers
pub struct PullContext {
    config: Config,
    connections: ConnectionManager,
    tokens: TokenManager,
    progress: Arc<ProgressAggregator>,
    download: BlobDownloadConfig,
    concurrency: usize,
    cancel: CancellationToken,
    tx: Option<EventSender>,
}

impl PullContext {
    // No public constructor - use PullContextBuilder instead

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    #[must_use]
    pub fn progress(&self) -> &Arc<ProgressAggregator> {
        &self.progress
    }

    #[must_use]
    pub fn download_config(&self) -> &BlobDownloadConfig {
        &self.download
    }

    /// Worker count, already clamped
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Root token; cancelling it stops the whole pull
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl EventEmitter for PullContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

/// Builder for [`PullContext`]
#[derive(Default)]
pub struct PullContextBuilder {
    config: Option<Config>,
    net: Option<NetConfig>,
    download: Option<BlobDownloadConfig>,
    concurrency: Option<usize>,
    cancel: Option<CancellationToken>,
    tx: Option<EventSender>,
}

impl PullContextBuilder {
    /// Create new context builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration; network and download settings derive from it
    /// unless given explicitly
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_net_config(mut self, net: NetConfig) -> Self {
        self.net = Some(net);
        self
    }

    #[must_use]
    pub fn with_download_config(mut self, download: BlobDownloadConfig) -> Self {
        self.download = Some(download);
        self
    }

    /// Override the worker count; clamped to `[1, MAX_THREADS]`
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Build the context
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP session cannot be created.
    pub fn build(self) -> Result<PullContext, Error> {
        let config = self.config.unwrap_or_default();
        let net = self.net.unwrap_or_else(|| NetConfig::from(&config));
        let download = self
            .download
            .unwrap_or_else(|| BlobDownloadConfig::from(&config));
        let concurrency = self
            .concurrency
            .map_or_else(|| config.concurrency(), clamp_concurrency);

        let cancel = self.cancel.unwrap_or_default();

        Ok(PullContext {
            connections: ConnectionManager::with_cancellation(net, cancel.clone())?,
            tokens: TokenManager::new(&config.auth, self.tx.clone()),
            progress: Arc::new(ProgressAggregator::new(self.tx.clone())),
            download,
            concurrency,
            cancel,
            tx: self.tx,
            config,
        })
    }
}
