//! Low-level streaming download mechanics

use crate::client::classify_error;
use bytes::Bytes;
use futures::StreamExt;
use layerpull_errors::{Error, NetworkError};
use layerpull_events::ProgressAggregator;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Parameters for streaming one response body to disk
pub(super) struct StreamParams<'a> {
    pub digest: &'a str,
    /// URL being downloaded, used for timeout error reporting
    pub url: &'a str,
    pub path: &'a Path,
    /// Bytes already on disk that the body continues; 0 truncates the file
    pub offset: u64,
    pub declared_total: Option<u64>,
    pub buffer_size: usize,
    pub chunk_timeout: Duration,
    pub progress: &'a ProgressAggregator,
}

async fn open_destination(params: &StreamParams<'_>) -> Result<File, Error> {
    let opened = if params.offset > 0 {
        OpenOptions::new().append(true).open(params.path).await
    } else {
        File::create(params.path).await
    };
    opened.map_err(|e| Error::io_with_path(&e, params.path))
}

/// Stream a response body into the destination file.
///
/// Returns the number of bytes on disk afterwards.
pub(super) async fn stream_to_file(
    response: reqwest::Response,
    params: &StreamParams<'_>,
) -> Result<u64, Error> {
    let file = open_destination(params).await?;
    let mut writer = BufWriter::with_capacity(params.buffer_size, file);
    let mut on_disk = params.offset;
    let mut stream = response.bytes_stream();

    loop {
        match tokio::time::timeout(params.chunk_timeout, stream.next()).await {
            Ok(Some(chunk)) => {
                let chunk: Bytes = chunk.map_err(|e| classify_error(&e, params.url))?;
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| Error::io_with_path(&e, params.path))?;
                on_disk += chunk.len() as u64;
                params
                    .progress
                    .on_blob_bytes_advanced(params.digest, on_disk, params.declared_total);
            }
            Ok(None) => break,
            Err(_) => {
                return Err(NetworkError::Timeout {
                    url: params.url.to_string(),
                }
                .into());
            }
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| Error::io_with_path(&e, params.path))?;
    Ok(on_disk)
}
