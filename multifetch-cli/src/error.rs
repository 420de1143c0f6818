//! CLI error type.

use multifetch::config::ConfigError;
use multifetch::logging::LoggingError;
use multifetch::FetchError;
use thiserror::Error;

/// Everything that can end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// The download job failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The configuration file could not be used.
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// Invalid or missing command-line input.
    #[error("{0}")]
    Config(String),

    /// An interactive prompt failed.
    #[error("prompt failed: {0}")]
    Prompt(String),

    /// The async runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CliError {
    /// Stage name shown next to the error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(e) => e.stage(),
            Self::ConfigFile(_) | Self::Config(_) | Self::Prompt(_) => "configuration",
            Self::Logging(_) | Self::Runtime(_) => "startup",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_follows_fetch_error() {
        let err = CliError::from(FetchError::UnknownSize {
            url: "https://host/file".to_string(),
        });
        assert_eq!(err.stage(), "probe");
        assert_eq!(
            err.to_string(),
            "server did not disclose the size of https://host/file"
        );
    }

    #[test]
    fn test_config_error_stage() {
        let err = CliError::Config("missing server".to_string());
        assert_eq!(err.stage(), "configuration");
        assert_eq!(err.to_string(), "missing server");
    }
}
