//! Options and helpers shared across CLI commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use console::Term;
use dialoguer::Input;
use multifetch::config::{ConfigFile, JobConfig, TrustConfig};
use multifetch::download::RetryPolicy;
use multifetch::transport::LocalEndpoint;
use multifetch::ResourceLocator;

use crate::error::CliError;

/// Where the resource lives.
#[derive(Debug, Clone, Default, Args)]
pub struct TargetArgs {
    /// Server address, e.g. https://files.example.com:40000
    #[arg(short, long)]
    pub server: Option<String>,

    /// Resource name on the server
    pub name: Option<String>,
}

/// Transport options shared by commands that talk to the server.
#[derive(Debug, Clone, Default, Args)]
pub struct TransportArgs {
    /// Local address to bind one path to (repeatable, or comma separated)
    #[arg(short, long = "bind", value_delimiter = ',')]
    pub bind: Vec<LocalEndpoint>,

    /// PEM certificate to trust instead of the system roots
    #[arg(long, value_name = "FILE", conflicts_with = "insecure")]
    pub ca_cert: Option<PathBuf>,

    /// Skip server certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Connection and handshake timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub handshake_timeout: Option<u64>,
}

/// Options controlling the transfer itself.
#[derive(Debug, Clone, Default, Args)]
pub struct TransferArgs {
    /// Output file (defaults to the resource's file name)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory for staged chunks (defaults to .<output>.parts)
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Fetch cycle length in seconds
    #[arg(long, value_name = "SECS")]
    pub cycle: Option<u64>,

    /// Give up on a chunk after this many failed cycles without progress
    /// (0 retries forever)
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Expected SHA-256 of the assembled file
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,

    /// Skip the per-path health check before the transfer
    #[arg(long)]
    pub no_health_check: bool,
}

/// Load the config file from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Resolve the resource locator from arguments, config and prompts.
///
/// Missing values are prompted for when stdin is a terminal.
pub fn resolve_target(target: &TargetArgs, config: &ConfigFile) -> Result<ResourceLocator, CliError> {
    // CLI takes precedence, then config
    let server = match target
        .server
        .clone()
        .or_else(|| config.network.server.clone())
    {
        Some(server) => server,
        None => prompt("Server address")?,
    };
    let name = match target.name.clone() {
        Some(name) => name,
        None => prompt("File name")?,
    };

    let locator = ResourceLocator::new(server, name);
    locator.url()?;
    Ok(locator)
}

fn prompt(label: &str) -> Result<String, CliError> {
    if !Term::stdout().is_term() {
        return Err(CliError::Config(format!(
            "{} is required when not running interactively",
            label
        )));
    }
    Input::<String>::new()
        .with_prompt(label)
        .interact_text()
        .map(|s| s.trim().to_string())
        .map_err(|e| CliError::Prompt(e.to_string()))
}

/// Build the job configuration: config file values overridden by flags.
pub fn resolve_job_config(
    config: &ConfigFile,
    output: PathBuf,
    transport: &TransportArgs,
    transfer: &TransferArgs,
) -> Result<JobConfig, CliError> {
    let mut job = config.job_config(output)?;

    if !transport.bind.is_empty() {
        job = job.with_endpoints(transport.bind.clone());
    }
    if transport.insecure {
        job = job.with_trust(TrustConfig::Insecure);
    } else if let Some(ref cert) = transport.ca_cert {
        job = job.with_trust(TrustConfig::Pinned(cert.clone()));
    }
    if let Some(secs) = transport.handshake_timeout {
        let idle = job.idle_timeout;
        job = job.with_timeouts(Duration::from_secs(secs), idle);
    }

    if let Some(ref dir) = transfer.staging_dir {
        job = job.with_staging_dir(dir.clone());
    }
    if let Some(secs) = transfer.cycle {
        if secs == 0 {
            return Err(CliError::Config("--cycle must be at least 1 second".to_string()));
        }
        job = job.with_cycle(Duration::from_secs(secs));
    }
    if let Some(max_retries) = transfer.max_retries {
        let mut file_transfer = config.transfer.clone();
        file_transfer.max_retries = max_retries;
        job = job.with_retry(file_transfer.retry_policy());
    }
    if let Some(ref checksum) = transfer.sha256 {
        job = job.with_expected_sha256(checksum.clone());
    }
    if transfer.no_health_check {
        job = job.with_health_check(false);
    }
    Ok(job)
}

/// Output path: the flag, or the resource's file name in the working directory.
pub fn resolve_output(transfer: &TransferArgs, locator: &ResourceLocator) -> PathBuf {
    transfer
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(locator.file_name()))
}

/// Human-readable description of a retry policy.
pub fn describe_retry(policy: &RetryPolicy) -> String {
    match policy.max_attempts() {
        None => "unbounded".to_string(),
        Some(n) => format!("up to {} failed cycles", n),
    }
}

/// Start a multi-threaded tokio runtime for a command.
pub fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)
}
