//! Manifest fetching and platform resolution

use crate::client::classify_error;
use crate::context::PullContext;
use crate::endpoint::RegistryEndpoint;
use layerpull_errors::{Error, ManifestError, NetworkError};
use layerpull_events::{AppEvent, EventEmitter, ManifestEvent};
use layerpull_manifest::{media, Manifest};
use layerpull_types::{BlobDescriptor, ImageReference, Platform};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;

/// Resolves an image reference into the blobs that make it up
pub struct ManifestResolver<'a> {
    ctx: &'a PullContext,
    endpoint: &'a RegistryEndpoint,
}

impl<'a> ManifestResolver<'a> {
    #[must_use]
    pub fn new(ctx: &'a PullContext, endpoint: &'a RegistryEndpoint) -> Self {
        Self { ctx, endpoint }
    }

    /// Fetch the manifest for `reference`, narrowing a manifest list to
    /// `platform`, and list its blobs.
    ///
    /// # Errors
    ///
    /// Returns network, authentication or manifest errors; a list without an
    /// entry for `platform` yields `ManifestError::PlatformNotFound`.
    pub async fn resolve(
        &self,
        reference: &ImageReference,
        platform: &Platform,
    ) -> Result<Vec<BlobDescriptor>, Error> {
        let display = reference.to_string();
        self.ctx.emit(AppEvent::Manifest(ManifestEvent::Fetching {
            reference: display.clone(),
        }));

        let manifest = match self
            .fetch(&reference.repository, &reference.target.to_string())
            .await?
        {
            Manifest::Index(index) => {
                let entry = index.select(platform)?;
                self.ctx.emit(AppEvent::Manifest(ManifestEvent::PlatformSelected {
                    reference: display.clone(),
                    platform: platform.to_string(),
                    digest: entry.digest.clone(),
                }));
                let selected = self.fetch(&reference.repository, &entry.digest).await?;
                if matches!(selected, Manifest::Index(_)) {
                    return Err(ManifestError::ParseError {
                        message: format!("{} points at another manifest list", entry.digest),
                    }
                    .into());
                }
                selected
            }
            manifest => manifest,
        };

        let blobs = manifest.blob_descriptors()?;
        let total_bytes = blobs.iter().map(|b| b.size_hint).sum::<Option<u64>>();
        self.ctx.emit(AppEvent::Manifest(ManifestEvent::Resolved {
            reference: display,
            media_type: manifest.kind().to_string(),
            blobs: blobs.len(),
            total_bytes,
        }));
        Ok(blobs)
    }

    /// GET one manifest, renewing the token once on 401
    async fn fetch(&self, repository: &str, reference: &str) -> Result<Manifest, Error> {
        let url = self.endpoint.manifest_url(repository, reference);
        let accept = HeaderValue::from_str(&media::accept_header())
            .map_err(|e| Error::internal(format!("invalid Accept header: {e}")))?;
        let mut force_refresh = false;

        loop {
            let session = self.ctx.connections().get_session()?;
            let auth = self
                .ctx
                .tokens()
                .acquire(&session, self.endpoint, repository, force_refresh)
                .await?;
            let mut headers = auth.to_header_map();
            headers.insert(ACCEPT, accept.clone());

            let response = session.get(&url, &headers).await?;
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED && !force_refresh {
                tracing::debug!(%url, "manifest request unauthorized, renewing token");
                force_refresh = true;
                continue;
            }
            if !status.is_success() {
                return Err(NetworkError::http(
                    status.as_u16(),
                    format!("manifest {repository}:{reference}"),
                )
                .into());
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response
                .bytes()
                .await
                .map_err(|e| classify_error(&e, &url))?;
            return Ok(Manifest::parse(&body, content_type.as_deref())?);
        }
    }
}
