//! Fetch command - download a resource over every configured path.

use std::sync::Arc;

use clap::Args;
use console::{style, Term};
use multifetch::download::ProgressSink;
use multifetch::MultiPathDownloader;
use tracing::debug;

use super::common::{
    describe_retry, resolve_job_config, resolve_output, resolve_target, runtime, TargetArgs,
    TransferArgs, TransportArgs,
};
use crate::error::CliError;
use crate::ui::BarSink;

/// Arguments for `multifetch fetch`.
#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub transport: TransportArgs,

    #[command(flatten)]
    pub transfer: TransferArgs,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, config: &multifetch::config::ConfigFile) -> Result<(), CliError> {
    let locator = resolve_target(&args.target, config)?;
    let output = resolve_output(&args.transfer, &locator);
    let job = resolve_job_config(config, output, &args.transport, &args.transfer)?;

    debug!(?job, "Resolved job configuration");

    let endpoints = job.effective_endpoints();
    println!("Fetching {}", style(&locator).bold());
    println!("  Output:  {}", job.output.display());
    println!("  Staging: {}", job.staging_dir.display());
    println!(
        "  Paths:   {}",
        endpoints
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Retry:   {}", describe_retry(&job.retry));
    println!();

    let bar = Arc::new(if Term::stdout().is_term() {
        BarSink::new()
    } else {
        BarSink::hidden()
    });
    let sink: Arc<dyn ProgressSink> = bar.clone();

    let downloader = MultiPathDownloader::new(job);
    let result = runtime()?.block_on(downloader.download(&locator, Some(sink)));

    let summary = match result {
        Ok(summary) => {
            bar.finish();
            summary
        }
        Err(e) => {
            bar.abandon();
            return Err(e.into());
        }
    };

    let secs = summary.elapsed.as_secs_f64().max(0.001);
    println!();
    println!(
        "{} {} ({} bytes, {} resumed) in {:.1}s, {:.2} MB/s",
        style("Saved").green().bold(),
        summary.output.display(),
        summary.total_size,
        summary.resumed_bytes,
        secs,
        summary.fetched_bytes as f64 / secs / 1_000_000.0
    );
    Ok(())
}
