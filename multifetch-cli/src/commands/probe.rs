//! Probe command - check every path and report the resource size.

use clap::Args;
use console::style;
use multifetch::config::ConfigFile;
use multifetch::download::{probe_paths, HttpRangeSource, ResourceProbe};
use multifetch::transport::{TransportPath, TransportSettings};
use multifetch::trust::TrustStore;

use super::common::{
    resolve_job_config, resolve_target, runtime, TargetArgs, TransferArgs, TransportArgs,
};
use crate::error::CliError;

/// Arguments for `multifetch probe`.
#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub transport: TransportArgs,
}

/// Run the probe command.
pub fn run(args: ProbeArgs, config: &ConfigFile) -> Result<(), CliError> {
    let locator = resolve_target(&args.target, config)?;
    let url = locator.url()?;
    let job = resolve_job_config(
        config,
        locator.file_name().into(),
        &args.transport,
        &TransferArgs::default(),
    )?;

    let trust = TrustStore::load(&job.trust)?;

    runtime()?.block_on(async {
        let paths = TransportPath::bind_all(
            &job.effective_endpoints(),
            &trust,
            TransportSettings::from(&job),
        )?;
        let sources: Vec<HttpRangeSource> = paths
            .into_iter()
            .map(|path| HttpRangeSource::new(path, url.clone()))
            .collect();

        println!("Probing {}", style(&locator).bold());
        for health in probe_paths(&sources, job.probe_timeout).await {
            let status = match &health.result {
                Ok(response) => format!(
                    "{} length={} ranges={}",
                    style("ok").green(),
                    response
                        .content_length
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    if response.accepts_ranges { "yes" } else { "no" }
                ),
                Err(e) => format!("{} {}", style("failed").red(), e),
            };
            println!(
                "  {:<24} {:>6} ms  {}",
                health.label,
                health.latency.as_millis(),
                status
            );
        }

        let total = ResourceProbe::new(job.probe_timeout).run(&sources[0]).await?;
        println!();
        println!("Resource size: {} bytes", total);
        Ok::<(), CliError>(())
    })
}
