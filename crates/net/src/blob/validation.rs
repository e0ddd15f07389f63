//! HTTP response validation for blob requests

use super::config::AttemptError;
use layerpull_errors::{Error, NetworkError};
use reqwest::header::CONTENT_RANGE;
use reqwest::{Response, StatusCode};

/// Sort a response into success, a reset condition, or a fault
pub(super) fn check_status(response: &Response) -> Result<(), AttemptError> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(AttemptError::Unauthorized),
        StatusCode::RANGE_NOT_SATISFIABLE => Err(AttemptError::RangeNotSatisfiable),
        status if status.is_success() => Ok(()),
        status => Err(AttemptError::Fault(
            NetworkError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("unexpected status"),
            )
            .into(),
        )),
    }
}

/// `bytes <start>-<end>/<total|*>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

pub(super) fn parse_content_range(value: &str) -> Option<ContentRange> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (span, total) = range.split_once('/')?;
    let (start, end) = span.split_once('-')?;
    let start = start.trim().parse().ok()?;
    let end = end.trim().parse().ok()?;
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    (start <= end).then_some(ContentRange { start, end, total })
}

/// Offset at which the response body starts.
///
/// A `206` must start exactly at `requested_offset`; a `200` means the
/// server ignored or rejected the range and is sending the whole blob.
pub(super) fn body_offset(
    response: &Response,
    url: &str,
    requested_offset: u64,
) -> Result<u64, Error> {
    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Ok(0);
    }

    let header = response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| NetworkError::UnexpectedContentRange {
            url: url.to_string(),
            message: "206 response without Content-Range".to_string(),
        })?;
    let range = parse_content_range(header).ok_or_else(|| NetworkError::UnexpectedContentRange {
        url: url.to_string(),
        message: format!("unparsable Content-Range {header:?}"),
    })?;

    if range.start != requested_offset {
        return Err(NetworkError::UnexpectedContentRange {
            url: url.to_string(),
            message: format!(
                "expected range starting at {requested_offset}, got {}",
                range.start
            ),
        }
        .into());
    }
    Ok(range.start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_range_forms() {
        assert_eq!(
            parse_content_range("bytes 100-199/200"),
            Some(ContentRange {
                start: 100,
                end: 199,
                total: Some(200)
            })
        );
        assert_eq!(
            parse_content_range("bytes 0-9/*").map(|r| r.total),
            Some(None)
        );
        assert_eq!(parse_content_range("bytes */200"), None);
        assert_eq!(parse_content_range("items 0-1/2"), None);
        assert_eq!(parse_content_range("bytes 9-1/20"), None);
    }
}
