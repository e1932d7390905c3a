//! Timed GET execution.
//!
//! Runs one request through a [`Transport`], drains the body and assembles
//! the [`Report`]. The first fatal condition aborts the whole fetch; nothing
//! is reported partially.

use super::report::{canonical_header_name, Report};
use super::transport::Transport;
use super::types::{FetchedResponse, ResponseBody, Target};
use crate::error::AppError;
use crate::infra::{decompress_body, is_supported_encoding};
use crate::shared::RequestTrace;
use http_body_util::BodyExt;
use hyper::{
    header::{HeaderName, CONTENT_ENCODING, CONTENT_LENGTH, LOCATION, TRANSFER_ENCODING},
    HeaderMap,
};
use std::time::Instant;

struct BodySummary {
    bytes: u64,
    compressed: bool,
}

/// Fetches `url` and measures every phase of the exchange.
pub async fn time_get<T: Transport>(transport: &T, url: &str) -> Result<Report, AppError> {
    let target = Target::parse(url)?;
    let mut trace = RequestTrace::new();

    tracing::debug!(host = %target.host, port = target.port, "Request in flight");
    let start = Instant::now();

    let response = match transport.round_trip(&target, &mut trace).await {
        Ok(response) => response,
        Err(e) => {
            if let Some(dns_error) = trace.dns_error() {
                return Err(AppError::Dns(dns_error.to_string()));
            }
            return Err(e);
        }
    };

    // A resolution error is fatal even when a response was obtained.
    if let Some(dns_error) = trace.dns_error() {
        return Err(AppError::Dns(dns_error.to_string()));
    }

    let FetchedResponse {
        status,
        reason,
        headers,
        body,
    } = response;

    let body = read_body(body, &headers).await;
    let total = start.elapsed();
    tracing::debug!(bytes = body.bytes, ?total, "Request completed");

    // Transfer codings are reported on their own line, and a decoded body
    // no longer matches its encoding headers.
    let mut hidden = vec![TRANSFER_ENCODING];
    if body.compressed {
        hidden.extend([CONTENT_ENCODING, CONTENT_LENGTH]);
    }

    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let (timings, dns, tls) = trace.finish(total);

    Ok(Report {
        dns: dns.unwrap_or_default(),
        timings,
        status,
        reason,
        location,
        bytes: body.bytes,
        compressed: body.compressed,
        transfer_encoding: transfer_encoding(&headers),
        headers: header_dump(&headers, &hidden),
        tls,
    })
}

/// Reads the body to the end.
///
/// A read error does not abort the fetch: it is logged and the count covers
/// the bytes received before it.
async fn read_body(body: ResponseBody, headers: &HeaderMap) -> BodySummary {
    let encoding = headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .filter(|e| is_supported_encoding(e))
        .map(|e| e.to_string());

    let (wire_bytes, raw) = drain(body, encoding.is_some()).await;

    let encoding = match encoding {
        Some(e) if wire_bytes > 0 => e,
        _ => {
            return BodySummary {
                bytes: wire_bytes,
                compressed: false,
            }
        }
    };

    match decompress_body(&raw, &encoding) {
        Ok(decoded) => BodySummary {
            bytes: decoded.len() as u64,
            compressed: true,
        },
        Err(e) => {
            tracing::warn!(wire_bytes, "Could not decode body: {}", e);
            BodySummary {
                bytes: wire_bytes,
                compressed: false,
            }
        }
    }
}

/// Counts body bytes, keeping them only when they must be decoded afterwards.
async fn drain(mut body: ResponseBody, keep: bool) -> (u64, Vec<u8>) {
    let mut count = 0u64;
    let mut kept = Vec::new();

    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Some(chunk) = frame.data_ref() {
                    count += chunk.len() as u64;
                    if keep {
                        kept.extend_from_slice(chunk);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(bytes = count, "Body read failed: {}", e);
                break;
            }
        }
    }

    (count, kept)
}

/// Codings listed in `Transfer-Encoding`, lowercased.
fn transfer_encoding(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Headers in the order they were received, minus `hidden`.
///
/// Built from the untouched map: `HeaderMap::remove` reorders entries.
fn header_dump(headers: &HeaderMap, hidden: &[HeaderName]) -> Vec<(String, Vec<String>)> {
    headers
        .keys()
        .filter(|name| !hidden.contains(name))
        .map(|name| {
            let values = headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (canonical_header_name(name.as_str()), values)
        })
        .collect()
}
