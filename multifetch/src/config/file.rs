//! INI configuration file.
//!
//! The file lives at `~/.multifetch/config.ini`:
//!
//! ```ini
//! [network]
//! bind = 192.168.1.6, 100.64.221.73
//! server = https://files.example.com:40000
//! handshake_timeout = 60
//! idle_timeout = 120
//! probe_timeout = 60
//! health_check = true
//!
//! [transfer]
//! cycle = 30
//! retry_delay_ms = 1000
//! max_retries = 0
//! backoff = fixed
//! staging_dir =
//!
//! [trust]
//! ca_cert = /etc/multifetch/ca.pem
//! insecure = false
//!
//! [logging]
//! level = info
//! file =
//! ```
//!
//! Missing keys fall back to defaults. CLI arguments override file values.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use super::job::{
    JobConfig, TrustConfig, DEFAULT_CYCLE_SECS, DEFAULT_HANDSHAKE_TIMEOUT_SECS,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS,
};
use crate::download::RetryPolicy;
use crate::transport::LocalEndpoint;

/// Errors reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    /// The file could not be written.
    #[error("failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be interpreted.
    #[error("invalid value for [{section}] {key} = {value:?}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    /// No home directory to place the file in.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Exponential or fixed delays between retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

impl FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => Err(format!("expected 'fixed' or 'exponential', got '{}'", other)),
        }
    }
}

impl BackoffKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Exponential => "exponential",
        }
    }
}

/// `[network]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSettings {
    /// Local addresses to bind, one path each.
    pub bind: Vec<String>,
    /// Default server base URL.
    pub server: Option<String>,
    /// Handshake timeout in seconds.
    pub handshake_timeout: u64,
    /// Idle timeout in seconds.
    pub idle_timeout: u64,
    /// Probe timeout in seconds.
    pub probe_timeout: u64,
    /// Probe every path before transferring.
    pub health_check: bool,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bind: Vec::new(),
            server: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_SECS,
            probe_timeout: DEFAULT_PROBE_TIMEOUT_SECS,
            health_check: true,
        }
    }
}

/// `[transfer]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSettings {
    /// Cycle length in seconds.
    pub cycle: u64,
    /// Delay after a failed cycle, in milliseconds.
    pub retry_delay_ms: u64,
    /// Consecutive failed cycles before giving up; 0 retries forever.
    pub max_retries: u32,
    /// Backoff shape.
    pub backoff: BackoffKind,
    /// Staging directory; defaults to a directory next to the output.
    pub staging_dir: Option<PathBuf>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            cycle: DEFAULT_CYCLE_SECS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_retries: 0,
            backoff: BackoffKind::Fixed,
            staging_dir: None,
        }
    }
}

impl TransferSettings {
    /// Retry policy described by these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry_delay_ms);
        match (self.max_retries, self.backoff) {
            (0, _) => RetryPolicy::Unbounded { delay },
            (max_attempts, BackoffKind::Fixed) => RetryPolicy::Fixed {
                max_attempts,
                delay,
            },
            (max_attempts, BackoffKind::Exponential) => {
                RetryPolicy::exponential(max_attempts).with_initial_delay(delay)
            }
        }
    }
}

/// `[trust]` section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrustSettings {
    /// Pinned CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,
    /// Skip server verification entirely.
    pub insecure: bool,
}

impl TrustSettings {
    /// Trust configuration described by these settings.
    ///
    /// `insecure` wins over a configured certificate.
    pub fn trust_config(&self) -> TrustConfig {
        if self.insecure {
            TrustConfig::Insecure
        } else if let Some(ref path) = self.ca_cert {
            TrustConfig::Pinned(path.clone())
        } else {
            TrustConfig::System
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `multifetch=debug`.
    pub level: String,
    /// Optional log file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// The parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub network: NetworkSettings,
    pub transfer: TransferSettings,
    pub trust: TrustSettings,
    pub logging: LoggingSettings,
}

/// Path of the configuration file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".multifetch").join("config.ini"))
        .ok_or(ConfigError::NoHomeDir)
}

impl ConfigFile {
    /// Load from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path()?)
    }

    /// Load from a specific path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Build a job configuration for `output` from these settings.
    pub fn job_config(&self, output: impl Into<PathBuf>) -> Result<JobConfig, ConfigError> {
        let endpoints = self
            .network
            .bind
            .iter()
            .map(|s| {
                s.parse::<LocalEndpoint>()
                    .map_err(|e| ConfigError::InvalidValue {
                        section: "network",
                        key: "bind",
                        value: s.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = JobConfig::new(output)
            .with_endpoints(endpoints)
            .with_trust(self.trust.trust_config())
            .with_timeouts(
                Duration::from_secs(self.network.handshake_timeout),
                Duration::from_secs(self.network.idle_timeout),
            )
            .with_probe_timeout(Duration::from_secs(self.network.probe_timeout))
            .with_cycle(Duration::from_secs(self.transfer.cycle))
            .with_retry(self.transfer.retry_policy())
            .with_health_check(self.network.health_check);

        if let Some(ref dir) = self.transfer.staging_dir {
            config = config.with_staging_dir(dir.clone());
        }
        Ok(config)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("network")) {
            let network = &mut config.network;
            if let Some(bind) = section.get("bind") {
                network.bind = bind
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            network.server = optional_string(section, "server");
            network.handshake_timeout =
                parse_or(section, "network", "handshake_timeout", network.handshake_timeout)?;
            network.idle_timeout =
                parse_or(section, "network", "idle_timeout", network.idle_timeout)?;
            network.probe_timeout =
                parse_or(section, "network", "probe_timeout", network.probe_timeout)?;
            network.health_check =
                parse_or(section, "network", "health_check", network.health_check)?;
        }

        if let Some(section) = ini.section(Some("transfer")) {
            let transfer = &mut config.transfer;
            transfer.cycle = parse_or(section, "transfer", "cycle", transfer.cycle)?;
            if transfer.cycle == 0 {
                return Err(ConfigError::InvalidValue {
                    section: "transfer",
                    key: "cycle",
                    value: "0".to_string(),
                    reason: "cycle must be at least one second".to_string(),
                });
            }
            transfer.retry_delay_ms =
                parse_or(section, "transfer", "retry_delay_ms", transfer.retry_delay_ms)?;
            transfer.max_retries =
                parse_or(section, "transfer", "max_retries", transfer.max_retries)?;
            transfer.backoff = parse_or(section, "transfer", "backoff", transfer.backoff)?;
            transfer.staging_dir = optional_string(section, "staging_dir").map(PathBuf::from);
        }

        if let Some(section) = ini.section(Some("trust")) {
            config.trust.ca_cert = optional_string(section, "ca_cert").map(PathBuf::from);
            config.trust.insecure = parse_or(section, "trust", "insecure", false)?;
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = optional_string(section, "level") {
                config.logging.level = level;
            }
            config.logging.file = optional_string(section, "file").map(PathBuf::from);
        }

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("network"))
            .set("bind", self.network.bind.join(", "))
            .set("server", self.network.server.clone().unwrap_or_default())
            .set("handshake_timeout", self.network.handshake_timeout.to_string())
            .set("idle_timeout", self.network.idle_timeout.to_string())
            .set("probe_timeout", self.network.probe_timeout.to_string())
            .set("health_check", self.network.health_check.to_string());

        ini.with_section(Some("transfer"))
            .set("cycle", self.transfer.cycle.to_string())
            .set("retry_delay_ms", self.transfer.retry_delay_ms.to_string())
            .set("max_retries", self.transfer.max_retries.to_string())
            .set("backoff", self.transfer.backoff.as_str())
            .set("staging_dir", path_string(&self.transfer.staging_dir));

        ini.with_section(Some("trust"))
            .set("ca_cert", path_string(&self.trust.ca_cert))
            .set("insecure", self.trust.insecure.to_string());

        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set("file", path_string(&self.logging.file));

        ini
    }
}

fn optional_string(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn path_string(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn parse_or<T>(
    section: &Properties,
    section_name: &'static str,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional_string(section, key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            section: section_name,
            key,
            value: value.clone(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.network.bind = vec!["192.168.1.6".to_string(), "100.64.221.73".to_string()];
        config.network.server = Some("https://files.example.com:40000".to_string());
        config.transfer.cycle = 15;
        config.transfer.max_retries = 5;
        config.transfer.backoff = BackoffKind::Exponential;
        config.trust.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        config.logging.level = "debug".to_string();

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[network]\nbind = 10.0.0.2 , 10.0.0.3,\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.network.bind, vec!["10.0.0.2", "10.0.0.3"]);
        assert_eq!(config.transfer, TransferSettings::default());
    }

    #[test]
    fn test_invalid_value_reports_key() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[transfer]\ncycle = soon\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "transfer");
                assert_eq!(key, "cycle");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_cycle_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[transfer]\ncycle = 0\n").unwrap();

        assert!(ConfigFile::load_from(&path).is_err());
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let mut transfer = TransferSettings::default();
        assert_eq!(
            transfer.retry_policy(),
            RetryPolicy::Unbounded {
                delay: Duration::from_secs(1)
            }
        );

        transfer.max_retries = 3;
        assert_eq!(
            transfer.retry_policy(),
            RetryPolicy::Fixed {
                max_attempts: 3,
                delay: Duration::from_secs(1)
            }
        );

        transfer.backoff = BackoffKind::Exponential;
        assert!(matches!(
            transfer.retry_policy(),
            RetryPolicy::ExponentialBackoff { max_attempts: 3, .. }
        ));
    }

    #[test]
    fn test_trust_config_precedence() {
        let mut trust = TrustSettings::default();
        assert_eq!(trust.trust_config(), TrustConfig::System);

        trust.ca_cert = Some(PathBuf::from("ca.pem"));
        assert_eq!(
            trust.trust_config(),
            TrustConfig::Pinned(PathBuf::from("ca.pem"))
        );

        trust.insecure = true;
        assert_eq!(trust.trust_config(), TrustConfig::Insecure);
    }

    #[test]
    fn test_job_config_rejects_bad_bind() {
        let mut config = ConfigFile::default();
        config.network.bind = vec!["not an address".to_string()];
        assert!(matches!(
            config.job_config("out.bin"),
            Err(ConfigError::InvalidValue { key: "bind", .. })
        ));
    }

    #[test]
    fn test_job_config_from_file_settings() {
        let mut config = ConfigFile::default();
        config.network.bind = vec!["127.0.0.1".to_string()];
        config.transfer.cycle = 12;
        config.transfer.staging_dir = Some(PathBuf::from("/var/tmp/stage"));

        let job = config.job_config("out.bin").unwrap();
        assert_eq!(job.local_endpoints.len(), 1);
        assert_eq!(job.cycle, Duration::from_secs(12));
        assert_eq!(job.staging_dir, PathBuf::from("/var/tmp/stage"));
    }
}
