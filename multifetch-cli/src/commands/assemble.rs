//! Assemble command - build the output from completely staged chunks.

use std::path::PathBuf;

use clap::Args;
use console::style;
use multifetch::config::{default_staging_dir, ConfigFile, JobConfig};
use multifetch::MultiPathDownloader;

use super::common::runtime;
use crate::error::CliError;

/// Arguments for `multifetch assemble`.
#[derive(Debug, Args)]
pub struct AssembleArgs {
    /// Output file to (re)build
    pub output: PathBuf,

    /// Directory holding the staged chunks (defaults to .<output>.parts)
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Expected SHA-256 of the assembled file
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<String>,
}

/// Run the assemble command.
pub fn run(args: AssembleArgs, config: &ConfigFile) -> Result<(), CliError> {
    let staging_dir = args
        .staging_dir
        .clone()
        .or_else(|| config.transfer.staging_dir.clone())
        .unwrap_or_else(|| default_staging_dir(&args.output));

    let mut job = JobConfig::new(&args.output).with_staging_dir(&staging_dir);
    if let Some(checksum) = args.sha256 {
        job = job.with_expected_sha256(checksum);
    }

    let summary = runtime()?.block_on(MultiPathDownloader::new(job).assemble_existing())?;

    println!(
        "{} {} from {} chunks ({} bytes)",
        style("Assembled").green().bold(),
        summary.output.display(),
        summary.chunks,
        summary.total_size
    );
    Ok(())
}
