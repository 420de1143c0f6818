//! HTTP range source over a transport path.
//!
//! This module provides the network side of a download:
//! - HEAD probes reading `Content-Length` and `Accept-Ranges`
//! - Ranged GETs (`Range: bytes=<start>-<end>`) streamed as they arrive
//! - Resource address construction from a server and a file name

use std::fmt;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{StatusCode, Url};

use super::partition::ByteRange;
use super::source::{ByteStream, ProbeResponse, RangeSource};
use crate::error::{FetchError, FetchResult, TransferError};
use crate::transport::TransportPath;

/// Server address plus resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    /// Server base, e.g. `https://files.example.com:40000`.
    pub server: String,
    /// Resource name relative to the server root.
    pub name: String,
}

impl ResourceLocator {
    /// Create a locator.
    pub fn new(server: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            name: name.into(),
        }
    }

    /// The full resource URL.
    ///
    /// A server without a scheme is assumed to speak HTTPS.
    pub fn url(&self) -> FetchResult<Url> {
        let server = self.server.trim().trim_end_matches('/');
        let name = self.name.trim().trim_start_matches('/');
        if server.is_empty() || name.is_empty() {
            return Err(FetchError::InvalidConfig(
                "server address and resource name are both required".to_string(),
            ));
        }

        let base = if server.contains("://") {
            server.to_string()
        } else {
            format!("https://{}", server)
        };
        Url::parse(&format!("{}/{}", base, name))
            .map_err(|e| FetchError::InvalidConfig(format!("invalid resource URL: {}", e)))
    }

    /// File name to save the resource as: the last path segment of the name.
    pub fn file_name(&self) -> String {
        self.name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download")
            .to_string()
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.server.trim_end_matches('/'),
            self.name.trim_start_matches('/')
        )
    }
}

/// A resource fetched through one transport path.
///
/// Owns its path: dropping the source releases the local endpoint.
#[derive(Debug)]
pub struct HttpRangeSource {
    path: TransportPath,
    url: Url,
}

impl HttpRangeSource {
    /// Fetch `url` through `path`.
    pub fn new(path: TransportPath, url: Url) -> Self {
        Self { path, url }
    }

    /// The transport path in use.
    pub fn path(&self) -> &TransportPath {
        &self.path
    }

    async fn head(&self) -> Result<ProbeResponse, TransferError> {
        let response = self.path.client().head(self.url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::Status(status.as_u16()));
        }

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());

        let accepts_ranges = response
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("bytes"))
            .unwrap_or(false);

        Ok(ProbeResponse {
            content_length,
            accepts_ranges,
        })
    }

    async fn get_range(&self, range: ByteRange) -> Result<ByteStream, TransferError> {
        let header = range
            .header_value()
            .ok_or_else(|| TransferError::Request("empty range requested".to_string()))?;

        let response = self
            .path
            .client()
            .get(self.url.clone())
            .header(RANGE, header)
            .send()
            .await?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let served = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|v| v.to_str().ok())
                    .map(content_range_start);
                // A shifted range would be staged at the wrong offset.
                if let Some(start) = served {
                    if start != Some(range.start) {
                        return Err(TransferError::RangeIgnored);
                    }
                }
            }
            // A full-content answer is only usable when it starts where we do.
            StatusCode::OK if range.start == 0 => {}
            StatusCode::OK => return Err(TransferError::RangeIgnored),
            status => return Err(TransferError::Status(status.as_u16())),
        }

        Ok(response
            .bytes_stream()
            .map_err(|e| TransferError::Read(e.to_string()))
            .boxed())
    }
}

/// First byte offset of a `Content-Range: bytes <first>-<last>/<total>` value.
fn content_range_start(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (first, _) = rest.split_once('-')?;
    first.trim().parse().ok()
}

impl RangeSource for HttpRangeSource {
    fn label(&self) -> String {
        self.path.endpoint().to_string()
    }

    fn url(&self) -> &str {
        self.url.as_str()
    }

    fn probe(&self) -> BoxFuture<'_, Result<ProbeResponse, TransferError>> {
        self.head().boxed()
    }

    fn fetch_range(&self, range: ByteRange) -> BoxFuture<'_, Result<ByteStream, TransferError>> {
        self.get_range(range).boxed()
    }
}
