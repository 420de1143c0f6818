//! Progress reporting for multi-path downloads.
//!
//! Workers report durable progress through a [`ProgressSink`]. The
//! orchestrator always feeds [`ProgressCounters`], whose atomic totals a
//! [`ProgressReporter`] task logs periodically, and forwards the same events
//! to an optional caller-supplied sink (the CLI's progress bar).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Receiver of progress events.
///
/// Byte counts only ever cover bytes that are durably staged, so a progress
/// display never runs ahead of what a resumed job would find on disk.
pub trait ProgressSink: Send + Sync {
    /// The job's size and chunk count are known.
    fn job_started(&self, _total_bytes: u64, _chunks: usize) {}

    /// A chunk found `bytes` already staged from an earlier run.
    fn chunk_resumed(&self, _index: usize, _bytes: u64) {}

    /// `bytes` more bytes of chunk `index` became durable.
    fn bytes_persisted(&self, index: usize, bytes: u64);

    /// Chunk `index` is completely staged.
    fn chunk_completed(&self, _index: usize) {}
}

/// Shared progress counters for a download job.
#[derive(Debug)]
pub struct ProgressCounters {
    chunk_progress: Vec<AtomicU64>,
    chunks_completed: AtomicUsize,
    total_size: AtomicU64,
}

impl ProgressCounters {
    /// Create counters for the given number of chunks.
    pub fn new(chunks: usize) -> Self {
        Self {
            chunk_progress: (0..chunks).map(|_| AtomicU64::new(0)).collect(),
            chunks_completed: AtomicUsize::new(0),
            total_size: AtomicU64::new(0),
        }
    }

    /// Number of chunks tracked.
    pub fn chunks(&self) -> usize {
        self.chunk_progress.len()
    }

    /// Declared size of the resource, zero until the job starts.
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::SeqCst)
    }

    /// Bytes staged across all chunks.
    pub fn staged_bytes(&self) -> u64 {
        self.chunk_progress
            .iter()
            .map(|p| p.load(Ordering::SeqCst))
            .sum()
    }

    /// Bytes staged for one chunk.
    pub fn chunk_bytes(&self, index: usize) -> u64 {
        self.chunk_progress
            .get(index)
            .map(|p| p.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Number of completed chunks.
    pub fn completed_chunks(&self) -> usize {
        self.chunks_completed.load(Ordering::SeqCst)
    }
}

impl ProgressSink for ProgressCounters {
    fn job_started(&self, total_bytes: u64, _chunks: usize) {
        self.total_size.store(total_bytes, Ordering::SeqCst);
    }

    fn chunk_resumed(&self, index: usize, bytes: u64) {
        if let Some(p) = self.chunk_progress.get(index) {
            p.store(bytes, Ordering::SeqCst);
        }
    }

    fn bytes_persisted(&self, index: usize, bytes: u64) {
        if let Some(p) = self.chunk_progress.get(index) {
            p.fetch_add(bytes, Ordering::SeqCst);
        }
    }

    fn chunk_completed(&self, index: usize) {
        if index < self.chunk_progress.len() {
            self.chunks_completed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Forwards every event to each inner sink in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ProgressSink>>) -> Self {
        Self { sinks }
    }
}

impl ProgressSink for FanoutSink {
    fn job_started(&self, total_bytes: u64, chunks: usize) {
        for sink in &self.sinks {
            sink.job_started(total_bytes, chunks);
        }
    }

    fn chunk_resumed(&self, index: usize, bytes: u64) {
        for sink in &self.sinks {
            sink.chunk_resumed(index, bytes);
        }
    }

    fn bytes_persisted(&self, index: usize, bytes: u64) {
        for sink in &self.sinks {
            sink.bytes_persisted(index, bytes);
        }
    }

    fn chunk_completed(&self, index: usize) {
        for sink in &self.sinks {
            sink.chunk_completed(index);
        }
    }
}

/// Periodic progress logger.
///
/// Runs as a tokio task that logs the counters at a fixed interval until
/// stopped. Dropping the reporter cancels the task without a final report.
pub struct ProgressReporter {
    handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
}

impl ProgressReporter {
    /// Start logging `counters` every `interval`.
    pub fn start(counters: Arc<ProgressCounters>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_counters = Arc::clone(&counters);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => log_progress(&task_counters),
                }
            }
        });

        Self {
            handle: Some(handle),
            cancel,
            counters,
        }
    }

    /// Stop the reporter, wait for the task, and log a final report.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.ok();
        }
        log_progress(&self.counters);
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn log_progress(counters: &ProgressCounters) {
    let total = counters.total_size();
    let staged = counters.staged_bytes();
    let percent = if total == 0 {
        100.0
    } else {
        staged as f64 * 100.0 / total as f64
    };
    info!(
        staged_bytes = staged,
        total_bytes = total,
        completed_chunks = counters.completed_chunks(),
        chunks = counters.chunks(),
        "Download progress {:.1}%",
        percent
    );
}
