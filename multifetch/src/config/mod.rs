//! Configuration for download jobs.
//!
//! - [`JobConfig`]: everything one job needs, built in code or from the file
//! - [`ConfigFile`]: the user's INI file at `~/.multifetch/config.ini`

mod file;
mod job;

pub use file::{
    config_file_path, BackoffKind, ConfigError, ConfigFile, LoggingSettings, NetworkSettings,
    TransferSettings, TrustSettings,
};
pub use job::{
    default_staging_dir, JobConfig, TrustConfig, DEFAULT_CYCLE_SECS, DEFAULT_HANDSHAKE_TIMEOUT_SECS,
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PROBE_TIMEOUT_SECS, DEFAULT_PROGRESS_INTERVAL_MS,
    DEFAULT_RETRY_DELAY_MS,
};
