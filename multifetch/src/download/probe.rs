//! Resource size discovery and per-path health checks.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::source::{ProbeResponse, RangeSource};
use crate::error::{FetchError, FetchResult, TransferError};

/// Size discovery for the job.
///
/// A single metadata request over one path. Any failure here is fatal: the
/// job cannot be partitioned without a length.
#[derive(Debug, Clone, Copy)]
pub struct ResourceProbe {
    timeout: Duration,
}

impl ResourceProbe {
    /// Probe with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Discover the total size of the resource behind `source`.
    pub async fn run<S: RangeSource + ?Sized>(&self, source: &S) -> FetchResult<u64> {
        let url = source.url().to_string();
        let response = match tokio::time::timeout(self.timeout, source.probe()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(FetchError::Probe {
                    url,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(FetchError::Probe {
                    url,
                    reason: format!("no response within {:?}", self.timeout),
                })
            }
        };

        let total = response
            .content_length
            .ok_or_else(|| FetchError::UnknownSize { url: url.clone() })?;

        if !response.accepts_ranges {
            warn!(url = %url, "Server does not advertise byte-range support");
        }
        info!(url = %url, total_bytes = total, path = %source.label(), "Resource size discovered");
        Ok(total)
    }
}

/// Result of a health check on one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHealth {
    /// Path label (local endpoint).
    pub label: String,
    /// Round-trip time of the metadata request.
    pub latency: Duration,
    /// What the server answered, or why the path failed.
    pub result: Result<ProbeResponse, TransferError>,
}

impl PathHealth {
    /// Whether the path answered successfully.
    pub fn is_healthy(&self) -> bool {
        self.result.is_ok()
    }
}

/// Issue one metadata request through every path and log the latency.
///
/// Never fails: an unhealthy path is reported, and its chunk worker will
/// retry through it like any other transient failure.
pub async fn probe_paths<S: RangeSource>(sources: &[S], timeout: Duration) -> Vec<PathHealth> {
    let checks = sources.iter().map(|source| async move {
        let started = Instant::now();
        let result = match tokio::time::timeout(timeout, source.probe()).await {
            Ok(result) => result,
            Err(_) => Err(TransferError::CycleTimeout(timeout)),
        };
        PathHealth {
            label: source.label(),
            latency: started.elapsed(),
            result,
        }
    });
    let report = futures::future::join_all(checks).await;

    for health in &report {
        match &health.result {
            Ok(response) => info!(
                path = %health.label,
                latency_ms = health.latency.as_millis() as u64,
                content_length = ?response.content_length,
                "Path healthy"
            ),
            Err(e) => warn!(
                path = %health.label,
                latency_ms = health.latency.as_millis() as u64,
                error = %e,
                "Path health check failed"
            ),
        }
    }
    debug!(
        healthy = report.iter().filter(|h| h.is_healthy()).count(),
        paths = report.len(),
        "Health check finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::source::testing::ScriptedSource;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_probe_reports_length() {
        let source = ScriptedSource::new(vec![0u8; 100]);
        let total = ResourceProbe::new(TIMEOUT).run(&source).await.unwrap();
        assert_eq!(total, 100);
    }

    #[tokio::test]
    async fn test_probe_without_length_is_unknown_size() {
        let source = ScriptedSource::new(vec![]).with_probe(Ok(ProbeResponse {
            content_length: None,
            accepts_ranges: true,
        }));
        let result = ResourceProbe::new(TIMEOUT).run(&source).await;
        assert!(matches!(result, Err(FetchError::UnknownSize { .. })));
    }

    #[tokio::test]
    async fn test_probe_failure_is_fatal() {
        let source = ScriptedSource::new(vec![]).with_probe(Err(TransferError::Status(404)));
        match ResourceProbe::new(TIMEOUT).run(&source).await {
            Err(FetchError::Probe { reason, .. }) => assert!(reason.contains("404")),
            other => panic!("Expected Probe error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_accepts_missing_range_advertisement() {
        let source = ScriptedSource::new(vec![]).with_probe(Ok(ProbeResponse {
            content_length: Some(42),
            accepts_ranges: false,
        }));
        assert_eq!(ResourceProbe::new(TIMEOUT).run(&source).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_probe_paths_reports_every_path() {
        let sources = vec![
            ScriptedSource::new(vec![0u8; 10]),
            ScriptedSource::new(vec![]).with_probe(Err(TransferError::Request(
                "connection refused".to_string(),
            ))),
        ];

        let report = probe_paths(&sources, TIMEOUT).await;

        assert_eq!(report.len(), 2);
        assert!(report[0].is_healthy());
        assert!(!report[1].is_healthy());
    }
}
