//! Streaming HTTP fetch with progress reporting.
//!
//! [`fetch_with_progress`] issues a single GET request, reads the body chunk by chunk and
//! reports the running byte count to a [`Logger`]. Failures are classified into
//! [`ImportError::Network`], [`ImportError::HttpStatus`], [`ImportError::EmptyBody`] and
//! [`ImportError::StreamRead`]. Nothing is retried.
//!
//! `data:` URLs never touch the network; their payload is decoded in place by
//! [`decode_data_url`].

use std::fmt;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};

use crate::error::{ImportError, ImportResult};
use crate::types::LogOptions;

use super::log::Logger;

/// Log text shared by the "starting" line and every progress tick of a remote download.
pub const LOADING_FROM_URL: &str = "Loading data from URL...";

/// Per-request options for [`fetch_with_progress`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Whole-request timeout. `None` leaves the client's default in place.
    pub timeout: Option<Duration>,
}

/// Build the default HTTP client: no `Referer` header is ever sent.
pub fn default_client() -> ImportResult<Client> {
    Client::builder()
        .referer(false)
        .build()
        .map_err(|source| ImportError::Network { source })
}

/// Fetch `url` and return the complete body.
///
/// While reading, every received chunk appends (or coalesces into) a
/// [`LOADING_FROM_URL`] log entry whose `progressText` is the formatted byte count so far.
/// When the server sends a `Content-Length`, `progress` carries the percentage as well.
/// A `data:` URL is decoded without a request and reported as one complete progress tick.
#[tracing::instrument(level = "debug", skip(client, options, logger))]
pub async fn fetch_with_progress(
    client: &Client,
    url: &str,
    options: &FetchOptions,
    logger: Option<&Logger>,
) -> ImportResult<Bytes> {
    if url.starts_with("data:") {
        let body = decode_data_url(url)?;
        let loaded = body.len() as u64;
        if let Some(log) = logger {
            log.info(LOADING_FROM_URL, progress_options(loaded, Some(loaded)));
        }
        tracing::debug!(bytes = loaded, "decoded data url");
        return Ok(body);
    }

    let mut request = client.get(url).headers(options.headers.clone());
    if let Some(timeout) = options.timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|source| {
        tracing::warn!(error = %source, "request failed");
        ImportError::Network { source }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImportError::HttpStatus {
            status: status.as_u16(),
            reason: http_error_status_text(status.as_u16()),
        });
    }
    if has_null_body(status) {
        return Err(ImportError::EmptyBody);
    }

    let total = response.content_length();
    let body = read_chunks(response.bytes_stream(), |loaded| {
        if let Some(log) = logger {
            log.info(LOADING_FROM_URL, progress_options(loaded, total));
        }
    })
    .await?;

    tracing::debug!(bytes = body.len(), "download complete");
    Ok(body)
}

/// Decode the payload of a `data:` URL.
///
/// The payload follows the first `,`. It is percent-decoded, then base64-decoded when the
/// header ends in `;base64` (ASCII whitespace inside the base64 text is ignored).
pub fn decode_data_url(url: &str) -> ImportResult<Bytes> {
    let invalid = |message: &str| ImportError::DataUrl {
        message: message.to_string(),
    };

    let rest = url.strip_prefix("data:").ok_or_else(|| invalid("missing data: scheme"))?;
    let (header, payload) = rest.split_once(',').ok_or_else(|| invalid("missing ','"))?;
    let payload = payload.split('#').next().unwrap_or_default();
    let raw = urlencoding::decode_binary(payload.as_bytes());

    let is_base64 = header
        .trim_end()
        .to_ascii_lowercase()
        .ends_with(";base64");
    if !is_base64 {
        return Ok(Bytes::from(raw.into_owned()));
    }

    let compact: Vec<u8> = raw.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map(Bytes::from)
        .map_err(|e| invalid(&format!("bad base64 payload: {e}")))
}

/// Drain a chunk stream into one buffer, calling `on_progress` with the running byte count
/// after each chunk.
///
/// Any stream error aborts with [`ImportError::StreamRead`]; the underlying error is only
/// logged through `tracing`.
pub async fn read_chunks<S, E>(stream: S, mut on_progress: impl FnMut(u64)) -> ImportResult<Bytes>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut loaded: u64 = 0;

    while let Some(next) = stream.next().await {
        let chunk = next.map_err(|e| {
            tracing::warn!(error = %e, loaded, "error while reading response body");
            ImportError::StreamRead
        })?;
        loaded += chunk.len() as u64;
        chunks.push(chunk);
        on_progress(loaded);
    }

    Ok(concat(chunks))
}

fn concat(mut chunks: Vec<Bytes>) -> Bytes {
    if chunks.len() == 1 {
        return chunks.pop().unwrap_or_default();
    }
    let len = chunks.iter().map(Bytes::len).sum();
    let mut out = BytesMut::with_capacity(len);
    for c in &chunks {
        out.extend_from_slice(c);
    }
    out.freeze()
}

fn progress_options(loaded: u64, total: Option<u64>) -> LogOptions {
    LogOptions {
        progress: total
            .filter(|t| *t > 0)
            .map(|t| (loaded as f64 / t as f64 * 100.0).min(100.0)),
        progress_text: Some(format_file_size(loaded)),
        ..LogOptions::default()
    }
}

/// Statuses for which a response never carries a body.
fn has_null_body(status: StatusCode) -> bool {
    matches!(status.as_u16(), 101 | 103 | 204 | 205 | 304)
}

/// Format a byte count with base-1000 units: `"500 B"`, `"1.50 KB"`, `"1.50 MB"`, `"2.00 GB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Human readable text for a failing HTTP status, e.g. `"HTTP 404 - Not Found"`.
///
/// Codes outside the common set render as `"HTTP {code}"`.
pub fn http_error_status_text(code: u16) -> String {
    let reason = match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return format!("HTTP {code}"),
    };
    format!("HTTP {code} - {reason}")
}
