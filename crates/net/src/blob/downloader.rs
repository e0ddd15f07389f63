//! The per-blob download state machine

use super::config::{AttemptError, DownloadAttemptState};
use super::layout::blob_path;
use super::resume::{discard, local_size, plan_range, RangePlan};
use super::retry::calculate_backoff_delay;
use super::stream::{stream_to_file, StreamParams};
use super::validation::{body_offset, check_status};
use crate::auth::AuthHeaders;
use crate::context::PullContext;
use crate::endpoint::RegistryEndpoint;
use crate::orchestrator::BlobFetcher;
use layerpull_errors::{DownloadError, Error, UserFacingError};
use layerpull_events::{
    AppEvent, DownloadEvent, EventEmitter, EventSender, FailureContext, ResetCause,
};
use layerpull_types::{BlobDescriptor, VerifiedBlobFile};
use reqwest::header::{HeaderValue, IF_RANGE, RANGE};
use std::path::Path;
use std::sync::Arc;
use tokio::fs as tokio_fs;
use tokio_util::sync::CancellationToken;

/// How credentials are renewed before the next try
#[derive(Debug, Clone, Copy)]
enum Renewal {
    /// Cached token if still valid
    Initial,
    /// New token after a 401, then a new session
    ForcedToken,
    /// New session after a 416, cached token if still valid
    Reconnect,
}

/// Downloads blobs of one repository into the configured output directory
pub struct BlobDownloader {
    ctx: Arc<PullContext>,
    endpoint: RegistryEndpoint,
    repository: String,
}

impl BlobDownloader {
    #[must_use]
    pub fn new(
        ctx: Arc<PullContext>,
        endpoint: RegistryEndpoint,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            endpoint,
            repository: repository.into(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Current auth headers for this repository, optionally forcing a new token
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the token exchange fails.
    pub async fn auth_headers(&self, force_refresh: bool) -> Result<AuthHeaders, Error> {
        let session = self.ctx.connections().get_session()?;
        self.ctx
            .tokens()
            .acquire(&session, &self.endpoint, &self.repository, force_refresh)
            .await
    }

    /// Drive one blob until it is verified on disk.
    ///
    /// Credentials are acquired inside the loop, so a failed token exchange
    /// restarts the blob like a 401 instead of ending it.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::RetryBudgetExceeded` once `max_attempts`
    /// faults have occurred, `DownloadError::ResetLimitExceeded` when the
    /// registry keeps forcing restarts, and `Error::Cancelled` if `cancel`
    /// fires between attempts. No unverified file is left behind in either
    /// of the first two cases.
    pub async fn download(
        &self,
        descriptor: &BlobDescriptor,
        cancel: &CancellationToken,
    ) -> Result<VerifiedBlobFile, Error> {
        let digest = descriptor.digest.to_string();
        let path = blob_path(
            &self.ctx.download_config().output_dir,
            &self.repository,
            &descriptor.digest,
        );
        if let Some(parent) = path.parent() {
            tokio_fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let url = self.endpoint.blob_url(&self.repository, &descriptor.digest);

        let mut state = DownloadAttemptState::default();
        let mut auth: Option<AuthHeaders> = None;
        let mut renewal = Renewal::Initial;
        self.ctx.progress().on_blob_started(&digest);

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let headers = match auth.take() {
                Some(headers) => headers,
                None => match self.renew(renewal).await {
                    Ok(headers) => headers,
                    Err(e) => {
                        if cancel.is_cancelled() {
                            return Err(Error::Cancelled);
                        }
                        tracing::warn!(digest = %digest, error = %e, "could not renew credentials");
                        self.begin_reset(
                            &digest,
                            &path,
                            ResetCause::CredentialsUnavailable,
                            &mut state,
                        )
                        .await?;
                        self.pause_before_reset(state.reset_count, cancel).await?;
                        continue;
                    }
                },
            };

            match self.attempt(descriptor, &url, &path, &headers, &mut state).await {
                Ok(verified) => {
                    let summary = self.ctx.progress().on_blob_completed(&digest);
                    tracing::info!(digest = %digest, bytes = verified.size, "{summary}");
                    self.emit(AppEvent::Download(DownloadEvent::Completed {
                        digest,
                        path: verified.path.clone(),
                        bytes: verified.size,
                        attempts: state.attempt_count + 1,
                    }));
                    return Ok(verified);
                }
                Err(AttemptError::Unauthorized) => {
                    self.begin_reset(&digest, &path, ResetCause::Unauthorized, &mut state)
                        .await?;
                    state.attempt_count = 0;
                    renewal = Renewal::ForcedToken;
                }
                Err(AttemptError::RangeNotSatisfiable) => {
                    self.begin_reset(&digest, &path, ResetCause::RangeNotSatisfiable, &mut state)
                        .await?;
                    discard(&path).await;
                    state.bytes_on_disk = 0;
                    state.attempt_count = 0;
                    renewal = Renewal::Reconnect;
                }
                Err(AttemptError::Fault(error)) => {
                    if matches!(error, Error::Cancelled) || cancel.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    auth = Some(headers);
                    self.handle_fault(&digest, &path, error, &mut state, cancel)
                        .await?;
                }
            }
        }
    }

    /// Fresh credentials for the next try
    async fn renew(&self, renewal: Renewal) -> Result<AuthHeaders, Error> {
        match renewal {
            Renewal::Initial => self.auth_headers(false).await,
            Renewal::ForcedToken => {
                let headers = self.auth_headers(true).await?;
                self.ctx.connections().refresh()?;
                Ok(headers)
            }
            Renewal::Reconnect => {
                self.ctx.connections().refresh()?;
                self.auth_headers(false).await
            }
        }
    }

    /// Back off before retrying a failed renewal
    async fn pause_before_reset(
        &self,
        resets: u32,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let delay = calculate_backoff_delay(self.ctx.download_config(), resets);
        tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Init, RangeCheck, Streaming and Verifying for one try
    async fn attempt(
        &self,
        descriptor: &BlobDescriptor,
        url: &str,
        path: &Path,
        auth: &AuthHeaders,
        state: &mut DownloadAttemptState,
    ) -> Result<VerifiedBlobFile, AttemptError> {
        let digest = descriptor.digest.to_string();
        state.bytes_on_disk = local_size(path).await?;
        let session = self.ctx.connections().get_session()?;

        let mut headers = auth.to_header_map();
        let (offset, declared_total) =
            match plan_range(&session, url, auth, state.bytes_on_disk).await? {
                RangePlan::Verify => return self.verify(descriptor, path).await,
                RangePlan::Resume {
                    offset,
                    remote_size,
                    etag,
                } => {
                    self.emit(AppEvent::Download(DownloadEvent::Resuming {
                        digest: digest.clone(),
                        offset,
                        remote_size,
                    }));
                    let range = HeaderValue::from_str(&format!(
                        "bytes={offset}-{}",
                        remote_size - 1
                    ))
                    .map_err(|e| Error::internal(format!("invalid range header: {e}")))?;
                    headers.insert(RANGE, range);
                    if let Some(etag) = etag {
                        headers.insert(IF_RANGE, etag);
                    }
                    (offset, Some(remote_size))
                }
                RangePlan::Fresh => {
                    if state.bytes_on_disk > 0 {
                        discard(path).await;
                        state.bytes_on_disk = 0;
                    }
                    (0, descriptor.size_hint)
                }
            };

        self.emit(AppEvent::Download(DownloadEvent::Started {
            digest: digest.clone(),
            url: url.to_string(),
            resume_offset: offset,
            total_bytes: declared_total,
        }));

        let response = session.get(url, &headers).await?;
        check_status(&response)?;
        let start = body_offset(&response, url, offset)?;
        let declared_total = if start == 0 {
            response.content_length().or(declared_total)
        } else {
            declared_total
        };

        let written = stream_to_file(
            response,
            &StreamParams {
                digest: &digest,
                url,
                path,
                offset: start,
                declared_total,
                buffer_size: self.ctx.download_config().buffer_size(declared_total),
                chunk_timeout: self.ctx.download_config().read_timeout,
                progress: self.ctx.progress(),
            },
        )
        .await?;
        state.bytes_on_disk = written;
        self.emit(AppEvent::Download(DownloadEvent::Progress {
            digest,
            bytes_on_disk: written,
            total_bytes: declared_total,
        }));

        self.verify(descriptor, path).await
    }

    async fn verify(
        &self,
        descriptor: &BlobDescriptor,
        path: &Path,
    ) -> Result<VerifiedBlobFile, AttemptError> {
        let size = local_size(path).await?;
        self.emit(AppEvent::Download(DownloadEvent::Verifying {
            digest: descriptor.digest.to_string(),
            bytes: size,
        }));

        let (matches, actual) = layerpull_hash::verify_file(path, &descriptor.digest).await?;
        if !matches {
            discard(path).await;
            return Err(AttemptError::Fault(
                DownloadError::ChecksumMismatch {
                    digest: descriptor.digest.to_string(),
                    expected: descriptor.digest.hex().to_string(),
                    actual: actual.to_hex(),
                }
                .into(),
            ));
        }

        Ok(VerifiedBlobFile {
            path: path.to_path_buf(),
            digest: descriptor.digest.clone(),
            size,
        })
    }

    /// Count a 401/416 restart, failing once the cap is passed
    async fn begin_reset(
        &self,
        digest: &str,
        path: &Path,
        cause: ResetCause,
        state: &mut DownloadAttemptState,
    ) -> Result<(), Error> {
        state.reset_count += 1;
        let max_resets = self.ctx.download_config().max_resets;
        if state.reset_count > max_resets {
            discard(path).await;
            return Err(self.fail(
                digest,
                DownloadError::ResetLimitExceeded {
                    digest: digest.to_string(),
                    resets: max_resets,
                }
                .into(),
            ));
        }

        tracing::debug!(digest, ?cause, resets = state.reset_count, "restarting blob");
        self.emit(AppEvent::Download(DownloadEvent::Reset {
            digest: digest.to_string(),
            cause,
            resets: state.reset_count,
        }));
        Ok(())
    }

    /// Spend one attempt on `error`, then back off or give up
    async fn handle_fault(
        &self,
        digest: &str,
        path: &Path,
        error: Error,
        state: &mut DownloadAttemptState,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        discard(path).await;
        state.bytes_on_disk = 0;

        let config = self.ctx.download_config();
        let attempts = state.record_fault(&error);
        if attempts >= config.max_attempts {
            return Err(self.fail(
                digest,
                DownloadError::RetryBudgetExceeded {
                    digest: digest.to_string(),
                    attempts,
                    kind: error.kind_label().to_string(),
                    last_error: error.user_message().into_owned(),
                }
                .into(),
            ));
        }

        let delay = calculate_backoff_delay(config, attempts);
        tracing::warn!(
            digest,
            attempt = attempts,
            max_attempts = config.max_attempts,
            error = %error,
            "blob attempt failed, retrying"
        );
        self.emit(AppEvent::Download(DownloadEvent::Retrying {
            digest: digest.to_string(),
            attempt: attempts,
            max_attempts: config.max_attempts,
            reason: error.to_string(),
            backoff_delay: delay,
        }));
        self.ctx
            .progress()
            .on_blob_retrying(digest, attempts, error.kind_label());

        tokio::select! {
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }

    fn fail(&self, digest: &str, error: Error) -> Error {
        self.emit(AppEvent::Download(DownloadEvent::Failed {
            digest: digest.to_string(),
            failure: FailureContext::from_error(&error),
        }));
        error
    }
}

impl EventEmitter for BlobDownloader {
    fn event_sender(&self) -> Option<&EventSender> {
        self.ctx.event_sender()
    }
}

impl BlobFetcher for BlobDownloader {
    async fn fetch(
        &self,
        descriptor: BlobDescriptor,
        cancel: CancellationToken,
    ) -> Result<VerifiedBlobFile, Error> {
        self.download(&descriptor, &cancel).await
    }
}
