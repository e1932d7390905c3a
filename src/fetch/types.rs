use crate::error::AppError;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Full};
use hyper::{body::Bytes, HeaderMap, StatusCode};
use std::convert::Infallible;
use url::{Host, Url};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Response body as handed from a transport to the driver.
pub type ResponseBody = UnsyncBoxBody<Bytes, BoxError>;

/// Where a request goes, split out of the URL the user gave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Host without IPv6 brackets; used for resolution and SNI.
    pub host: String,
    pub port: u16,
    /// Path plus query, never empty.
    pub path: String,
    pub is_https: bool,
    authority: String,
}

impl Target {
    pub fn parse(url: &str) -> Result<Self, AppError> {
        let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{}: {}", url, e)))?;

        let is_https = match parsed.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(AppError::InvalidUrl(format!(
                    "{}: unsupported scheme {:?}",
                    url, other
                )))
            }
        };

        let host = match parsed.host() {
            Some(Host::Domain(d)) => d.to_string(),
            Some(Host::Ipv4(ip)) => ip.to_string(),
            Some(Host::Ipv6(ip)) => ip.to_string(),
            None => return Err(AppError::InvalidUrl(format!("{}: URL has no host", url))),
        };
        let host_str = parsed.host_str().unwrap_or(&host).to_string();

        let default_port = if is_https { 443 } else { 80 };
        let port = parsed.port().unwrap_or(default_port);
        let authority = if port == default_port {
            host_str
        } else {
            format!("{}:{}", host_str, port)
        };

        let path = match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };

        Ok(Self {
            host,
            port,
            path,
            is_https,
            authority,
        })
    }

    /// `host[:port]`, with the port only when it is not the scheme default.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Absolute form of the request target, as HTTP/2 needs it.
    pub fn absolute_uri(&self) -> String {
        let scheme = if self.is_https { "https" } else { "http" };
        format!("{}://{}{}", scheme, self.authority, self.path)
    }
}

/// A response whose head has arrived and whose body is still unread.
pub struct FetchedResponse {
    pub status: StatusCode,
    /// Non-standard reason phrase from an HTTP/1 status line.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

/// Wraps an in-memory payload as a [`ResponseBody`].
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never: Infallible| -> BoxError { match never {} })
        .boxed_unsync()
}
