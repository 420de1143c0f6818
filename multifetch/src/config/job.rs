//! Per-job configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::RetryPolicy;
use crate::transport::LocalEndpoint;

/// Time allowed for connection setup and the TLS handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 60;

/// Idle time after which pooled connections are dropped.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

/// Deadline for the size probe.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 60;

/// Length of one fetch cycle. A stalled connection costs at most this long.
pub const DEFAULT_CYCLE_SECS: u64 = 30;

/// Delay between a failed cycle and the next attempt.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// How often aggregated progress is logged.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 5000;

/// How the server's identity is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustConfig {
    /// Verify against the built-in web PKI roots.
    #[default]
    System,
    /// Verify against a single pinned CA certificate (PEM file).
    Pinned(PathBuf),
    /// Accept any server certificate.
    Insecure,
}

/// Configuration for one download job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Local endpoints, one transport path each.
    ///
    /// Empty means a single path over the default route.
    pub local_endpoints: Vec<LocalEndpoint>,

    /// Server identity verification.
    pub trust: TrustConfig,

    /// Connection and handshake timeout per path.
    pub handshake_timeout: Duration,

    /// Pooled connection idle timeout per path.
    pub idle_timeout: Duration,

    /// Deadline for the size probe.
    pub probe_timeout: Duration,

    /// Length of one fetch cycle.
    pub cycle: Duration,

    /// Retry behaviour for failed cycles.
    pub retry: RetryPolicy,

    /// Directory holding staging stores and the job manifest.
    pub staging_dir: PathBuf,

    /// Final artifact path.
    pub output: PathBuf,

    /// Expected SHA-256 of the artifact (lowercase hex), if known.
    pub expected_sha256: Option<String>,

    /// Probe every path before the transfer and log its latency.
    pub health_check: bool,

    /// Interval for the progress log line.
    pub progress_interval: Duration,
}

impl JobConfig {
    /// Create a configuration writing to `output`, with defaults elsewhere.
    ///
    /// The staging directory defaults to a hidden directory next to the
    /// output file, see [`default_staging_dir`].
    pub fn new(output: impl Into<PathBuf>) -> Self {
        let output = output.into();
        Self {
            local_endpoints: Vec::new(),
            trust: TrustConfig::default(),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            cycle: Duration::from_secs(DEFAULT_CYCLE_SECS),
            retry: RetryPolicy::default(),
            staging_dir: default_staging_dir(&output),
            output,
            expected_sha256: None,
            health_check: true,
            progress_interval: Duration::from_millis(DEFAULT_PROGRESS_INTERVAL_MS),
        }
    }

    /// Add a local endpoint.
    pub fn with_endpoint(mut self, endpoint: LocalEndpoint) -> Self {
        self.local_endpoints.push(endpoint);
        self
    }

    /// Replace the local endpoints.
    pub fn with_endpoints(mut self, endpoints: Vec<LocalEndpoint>) -> Self {
        self.local_endpoints = endpoints;
        self
    }

    /// Set the trust configuration.
    pub fn with_trust(mut self, trust: TrustConfig) -> Self {
        self.trust = trust;
        self
    }

    /// Set the handshake and idle timeouts.
    pub fn with_timeouts(mut self, handshake: Duration, idle: Duration) -> Self {
        self.handshake_timeout = handshake;
        self.idle_timeout = idle;
        self
    }

    /// Set the probe deadline.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the cycle length.
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        self.cycle = cycle;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Require the artifact to match a SHA-256 checksum.
    pub fn with_expected_sha256(mut self, checksum: impl Into<String>) -> Self {
        self.expected_sha256 = Some(checksum.into().to_lowercase());
        self
    }

    /// Enable or disable the per-path health check.
    pub fn with_health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    /// Set the progress log interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Endpoints to build paths for, falling back to the default route.
    pub fn effective_endpoints(&self) -> Vec<LocalEndpoint> {
        if self.local_endpoints.is_empty() {
            vec![LocalEndpoint::default_route()]
        } else {
            self.local_endpoints.clone()
        }
    }
}

/// Staging directory used for an output file when none is configured.
///
/// `downloads/big.iso` stages into `downloads/.big.iso.parts`.
pub fn default_staging_dir(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let parent = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{}.parts", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = JobConfig::new("file.bin");
        assert!(config.local_endpoints.is_empty());
        assert_eq!(config.trust, TrustConfig::System);
        assert_eq!(config.cycle, Duration::from_secs(30));
        assert_eq!(config.handshake_timeout, Duration::from_secs(60));
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
        assert_eq!(config.retry, RetryPolicy::default());
        assert!(config.health_check);
        assert_eq!(config.staging_dir, PathBuf::from("./.file.bin.parts"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = JobConfig::new("/data/out.iso")
            .with_endpoint("192.168.1.6".parse().unwrap())
            .with_endpoint("100.64.221.73".parse().unwrap())
            .with_trust(TrustConfig::Insecure)
            .with_cycle(Duration::from_secs(10))
            .with_expected_sha256("ABCDEF")
            .with_health_check(false);

        assert_eq!(config.local_endpoints.len(), 2);
        assert_eq!(config.trust, TrustConfig::Insecure);
        assert_eq!(config.cycle, Duration::from_secs(10));
        assert_eq!(config.expected_sha256.as_deref(), Some("abcdef"));
        assert!(!config.health_check);
        assert_eq!(config.staging_dir, PathBuf::from("/data/.out.iso.parts"));
    }

    #[test]
    fn test_effective_endpoints_falls_back_to_default_route() {
        let config = JobConfig::new("out.bin");
        let endpoints = config.effective_endpoints();
        assert_eq!(endpoints.len(), 1);
        assert!(endpoints[0].is_default_route());
    }
}
