//! Multi-path download orchestrator.
//!
//! Drives one job from setup to artifact: bind the paths, probe the size,
//! partition, run one worker per chunk, then reassemble.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::fs;
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use super::assemble::Assembler;
use super::checksum::verify_checksum;
use super::http::{HttpRangeSource, ResourceLocator};
use super::manifest::JobManifest;
use super::partition::partition;
use super::probe::{probe_paths, ResourceProbe};
use super::progress::{FanoutSink, ProgressCounters, ProgressReporter, ProgressSink};
use super::source::RangeSource;
use super::staging::{remove_staging, StagingStore};
use super::state::{staging_file_index, ChunkDescriptor, ChunkOutcome};
use super::worker::{ChunkWorker, WorkerSettings};
use crate::config::JobConfig;
use crate::error::{FetchError, FetchResult};
use crate::transport::{TransportPath, TransportSettings};
use crate::trust::TrustStore;

/// What a finished job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Resource address.
    pub url: String,
    /// Assembled artifact.
    pub output: PathBuf,
    /// Artifact length.
    pub total_size: u64,
    /// Number of chunks (and paths).
    pub chunks: usize,
    /// Bytes fetched during this run.
    pub fetched_bytes: u64,
    /// Bytes reused from an earlier run.
    pub resumed_bytes: u64,
    /// Wall time of the job.
    pub elapsed: Duration,
}

/// Multi-path download orchestrator.
///
/// Every configured local endpoint becomes one transport path and fetches
/// one chunk of the resource.
#[derive(Debug, Clone)]
pub struct MultiPathDownloader {
    config: JobConfig,
}

impl MultiPathDownloader {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    /// The job configuration.
    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Download the resource at `locator` into the configured output.
    ///
    /// `sink` receives progress events in addition to the periodic log line.
    pub async fn download(
        &self,
        locator: &ResourceLocator,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> FetchResult<DownloadSummary> {
        let url = locator.url()?;
        let trust = TrustStore::load(&self.config.trust)?;
        let paths = TransportPath::bind_all(
            &self.config.effective_endpoints(),
            &trust,
            TransportSettings::from(&self.config),
        )?;

        let sources: Vec<HttpRangeSource> = paths
            .into_iter()
            .map(|path| HttpRangeSource::new(path, url.clone()))
            .collect();
        self.run_job(sources, sink).await
    }

    /// Run a job over already constructed sources, one chunk per source.
    pub async fn run_job<S>(
        &self,
        sources: Vec<S>,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> FetchResult<DownloadSummary>
    where
        S: RangeSource + 'static,
    {
        let started = Instant::now();
        let chunk_count = NonZeroUsize::new(sources.len()).ok_or(FetchError::NoPaths)?;
        let url = sources[0].url().to_string();

        if self.config.health_check && sources.len() > 1 {
            probe_paths(&sources, self.config.probe_timeout).await;
        }

        let total_size = ResourceProbe::new(self.config.probe_timeout)
            .run(&sources[0])
            .await?;
        let ranges = partition(total_size, chunk_count);
        for (index, range) in ranges.iter().enumerate() {
            info!(chunk = index, path = %sources[index].label(), range = %range, "Chunk assigned");
        }

        let staging_dir = self.config.staging_dir.clone();
        fs::create_dir_all(&staging_dir)
            .await
            .map_err(|e| FetchError::Storage {
                path: staging_dir.clone(),
                source: e,
            })?;
        let descriptors = ChunkDescriptor::for_ranges(&ranges, &staging_dir);
        let manifest = JobManifest::new(url.clone(), total_size, ranges);
        prepare_staging(&manifest, &descriptors, &staging_dir).await?;

        let counters = Arc::new(ProgressCounters::new(chunk_count.get()));
        let sink: Arc<dyn ProgressSink> = match sink {
            Some(user) => Arc::new(FanoutSink::new(vec![
                counters.clone() as Arc<dyn ProgressSink>,
                user,
            ])),
            None => counters.clone(),
        };
        sink.job_started(total_size, chunk_count.get());

        let reporter = ProgressReporter::start(Arc::clone(&counters), self.config.progress_interval);
        let outcomes = run_workers(
            descriptors.clone(),
            sources,
            WorkerSettings::from(&self.config),
            sink,
        )
        .await;
        reporter.stop().await;
        let outcomes = outcomes?;

        self.finish(&descriptors, &staging_dir).await?;

        let summary = DownloadSummary {
            url,
            output: self.config.output.clone(),
            total_size,
            chunks: chunk_count.get(),
            fetched_bytes: outcomes.iter().map(|o| o.fetched_bytes).sum(),
            resumed_bytes: outcomes.iter().map(|o| o.resumed_bytes).sum(),
            elapsed: started.elapsed(),
        };
        info!(
            output = %summary.output.display(),
            bytes = summary.total_size,
            fetched = summary.fetched_bytes,
            resumed = summary.resumed_bytes,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Download complete"
        );
        Ok(summary)
    }

    /// Assemble a job whose chunks are all staged, without touching the
    /// network.
    pub async fn assemble_existing(&self) -> FetchResult<DownloadSummary> {
        let started = Instant::now();
        let staging_dir = self.config.staging_dir.clone();
        let manifest = JobManifest::load(&staging_dir)
            .await?
            .ok_or_else(|| FetchError::Manifest {
                path: JobManifest::path_in(&staging_dir),
                reason: "no job manifest found".to_string(),
            })?;

        let descriptors = ChunkDescriptor::for_ranges(&manifest.ranges, &staging_dir);
        self.finish(&descriptors, &staging_dir).await?;

        Ok(DownloadSummary {
            url: manifest.url,
            output: self.config.output.clone(),
            total_size: manifest.total_size,
            chunks: descriptors.len(),
            fetched_bytes: 0,
            resumed_bytes: manifest.total_size,
            elapsed: started.elapsed(),
        })
    }

    /// Assemble, clean up staging data, then verify the artifact.
    async fn finish(&self, descriptors: &[ChunkDescriptor], staging_dir: &Path) -> FetchResult<()> {
        let assembler = Assembler::new(&self.config.output);
        assembler.assemble(descriptors).await?;
        assembler.cleanup(descriptors, staging_dir).await?;

        if let Some(expected) = self.config.expected_sha256.clone() {
            let output = self.config.output.clone();
            tokio::task::spawn_blocking(move || verify_checksum(&output, &expected))
                .await
                .map_err(|e| FetchError::Assembly {
                    path: self.config.output.clone(),
                    source: std::io::Error::other(e.to_string()),
                })??;
            info!(output = %self.config.output.display(), "Checksum verified");
        }
        Ok(())
    }
}

/// Make the staging directory consistent with `manifest`.
///
/// Staging stores are only kept when the directory already belongs to the
/// same job; anything else is discarded before the new manifest is written.
async fn prepare_staging(
    manifest: &JobManifest,
    descriptors: &[ChunkDescriptor],
    staging_dir: &Path,
) -> FetchResult<()> {
    let reusable = match JobManifest::load(staging_dir).await {
        Ok(Some(previous)) if previous.matches(manifest) => true,
        Ok(Some(_)) => {
            warn!(dir = %staging_dir.display(), "Staged data belongs to a different job, discarding");
            false
        }
        Ok(None) => false,
        Err(e) => {
            warn!(error = %e, "Unreadable job manifest, discarding staged data");
            false
        }
    };

    if !reusable {
        for descriptor in descriptors {
            remove_staging(&descriptor.staging).await?;
        }
        discard_stale_stores(staging_dir, descriptors.len()).await?;
        manifest.save(staging_dir).await?;
    }
    Ok(())
}

/// Remove staging stores left by an earlier job with more chunks.
async fn discard_stale_stores(staging_dir: &Path, chunks: usize) -> FetchResult<()> {
    let storage_err = |source| FetchError::Storage {
        path: staging_dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(staging_dir).await.map_err(storage_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(storage_err)? {
        let name = entry.file_name();
        let stale = name
            .to_str()
            .and_then(staging_file_index)
            .is_some_and(|index| index >= chunks);
        if stale {
            debug!(path = %entry.path().display(), "Removing stale staging store");
            remove_staging(&entry.path()).await?;
        }
    }
    Ok(())
}

/// Aborts every worker task still running when dropped.
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Spawn one worker per chunk and wait for all of them.
///
/// The first fatal error cancels the remaining workers. Their staging stores
/// keep whatever was synced.
async fn run_workers<S>(
    descriptors: Vec<ChunkDescriptor>,
    sources: Vec<S>,
    settings: WorkerSettings,
    sink: Arc<dyn ProgressSink>,
) -> FetchResult<Vec<ChunkOutcome>>
where
    S: RangeSource + 'static,
{
    let mut aborts = AbortOnDrop(Vec::with_capacity(descriptors.len()));
    let mut pending = FuturesUnordered::new();

    for (descriptor, source) in descriptors.into_iter().zip(sources) {
        let index = descriptor.index;
        let settings = settings.clone();
        let sink = Arc::clone(&sink);
        let handle = tokio::spawn(async move {
            let store = StagingStore::open(&descriptor.staging).await?;
            ChunkWorker::new(descriptor, source, store, settings, sink)
                .run()
                .await
        });
        aborts.0.push(handle.abort_handle());
        pending.push(async move { (index, handle.await) });
    }

    let mut outcomes = Vec::with_capacity(aborts.0.len());
    while let Some((index, joined)) = pending.next().await {
        let result = joined.unwrap_or_else(|e| {
            Err(FetchError::WorkerAborted {
                chunk: index,
                reason: e.to_string(),
            })
        });
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(chunk = index, error = %e, "Chunk failed, stopping remaining workers");
                return Err(e);
            }
        }
    }

    outcomes.sort_by_key(|o| o.index);
    Ok(outcomes)
}
