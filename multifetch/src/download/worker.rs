//! Resumable fetch loop for a single chunk.
//!
//! A worker owns everything it touches: its descriptor, its source (and
//! through it the transport path) and its staging store. The loop runs
//! bounded cycles until the staging store holds the whole range:
//!
//! ```text
//! Pending ──► Fetching ──► Persisting ──┬──► Done
//!                ▲                      │
//!                │                      ▼
//!                └──────────────── RetryWait
//! ```
//!
//! Received bytes are appended and synced before the cursor moves, so the
//! staging store length is always the resume point.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::partition::ByteRange;
use super::progress::ProgressSink;
use super::retry::RetryPolicy;
use super::source::RangeSource;
use super::staging::StagingStore;
use super::state::{ChunkDescriptor, ChunkOutcome, WorkerState};
use crate::config::JobConfig;
use crate::error::{FetchError, FetchResult, TransferError};

/// Timing and retry behaviour shared by every worker of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    /// Upper bound on one fetch cycle.
    pub cycle: Duration,
    /// What to do after a failed cycle.
    pub retry: RetryPolicy,
}

impl From<&JobConfig> for WorkerSettings {
    fn from(config: &JobConfig) -> Self {
        Self {
            cycle: config.cycle,
            retry: config.retry.clone(),
        }
    }
}

/// Fetches one chunk through one path into one staging store.
pub struct ChunkWorker<S> {
    descriptor: ChunkDescriptor,
    source: S,
    store: StagingStore,
    settings: WorkerSettings,
    sink: Arc<dyn ProgressSink>,
    state: WorkerState,
}

impl<S: RangeSource> ChunkWorker<S> {
    pub fn new(
        descriptor: ChunkDescriptor,
        source: S,
        store: StagingStore,
        settings: WorkerSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            descriptor,
            source,
            store,
            settings,
            sink,
            state: WorkerState::Pending,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run cycles until the chunk is completely staged.
    ///
    /// Transient failures are retried according to the retry policy. Only
    /// storage failures, a server ignoring the range, or an exhausted
    /// bounded policy end the worker with an error.
    pub async fn run(mut self) -> FetchResult<ChunkOutcome> {
        let index = self.descriptor.index;
        let len = self.descriptor.len();

        if self.store.len() > len {
            warn!(
                chunk = index,
                staged = self.store.len(),
                expected = len,
                "Staging store longer than its range, starting over"
            );
            self.store.reset().await?;
        }

        let resumed = self.store.len();
        if resumed > 0 {
            self.sink.chunk_resumed(index, resumed);
            debug!(chunk = index, bytes = resumed, "Resuming chunk");
        }

        let mut outcome = ChunkOutcome {
            index,
            resumed_bytes: resumed,
            fetched_bytes: 0,
            requests: 0,
            failed_cycles: 0,
        };
        // Consecutive failed cycles that persisted nothing.
        let mut stalled_failures = 0u32;

        while let Some(remaining) = self.descriptor.range.remaining(self.store.len()) {
            self.state = WorkerState::Fetching;
            outcome.requests += 1;
            let failure = self.fetch_cycle(remaining).await?;

            self.state = WorkerState::Persisting;
            let persisted = self.store.sync().await?;
            debug_assert!(self.store.len() <= len);
            if persisted > 0 {
                outcome.fetched_bytes += persisted;
                stalled_failures = 0;
                self.sink.bytes_persisted(index, persisted);
            }

            let Some(error) = failure else {
                continue;
            };

            if !error.is_transient() {
                return Err(FetchError::RangeIgnored {
                    chunk: index,
                    url: self.source.url().to_string(),
                });
            }

            outcome.failed_cycles += 1;
            if persisted == 0 {
                stalled_failures += 1;
            }

            let Some(delay) = self.settings.retry.delay_for_attempt(stalled_failures) else {
                return Err(FetchError::RetriesExhausted {
                    chunk: index,
                    attempts: stalled_failures,
                    last_error: error,
                });
            };

            warn!(
                chunk = index,
                path = %self.source.label(),
                error = %error,
                staged = self.store.len(),
                expected = len,
                retry_in_ms = delay.as_millis() as u64,
                "Fetch cycle failed"
            );
            self.state = WorkerState::RetryWait;
            tokio::time::sleep(delay).await;
        }

        self.state = WorkerState::Done;
        self.sink.chunk_completed(index);
        let staged = self.store.close().await?;
        info!(
            chunk = index,
            bytes = staged,
            fetched = outcome.fetched_bytes,
            requests = outcome.requests,
            "Chunk complete"
        );
        Ok(outcome)
    }

    /// One bounded attempt at the remaining range.
    ///
    /// Bytes are appended to the store as they arrive, never past the end of
    /// `remaining`. Returns the transient failure that ended the cycle, if
    /// any; a cycle cut short after making progress is not a failure.
    async fn fetch_cycle(&mut self, remaining: ByteRange) -> FetchResult<Option<TransferError>> {
        let deadline = Instant::now() + self.settings.cycle;
        let timed_out = TransferError::CycleTimeout(self.settings.cycle);
        let wanted = remaining.len();

        let mut body = match timeout_at(deadline, self.source.fetch_range(remaining)).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Ok(Some(e)),
            Err(_) => return Ok(Some(timed_out)),
        };

        let mut received = 0u64;
        while received < wanted {
            match timeout_at(deadline, body.next()).await {
                Ok(Some(Ok(bytes))) => {
                    let take = (bytes.len() as u64).min(wanted - received) as usize;
                    self.store.append(&bytes[..take]).await?;
                    received += take as u64;
                }
                Ok(Some(Err(e))) => return Ok(Some(e)),
                Ok(None) if received == 0 => return Ok(Some(TransferError::EmptyBody)),
                Ok(None) => {
                    debug!(
                        chunk = self.descriptor.index,
                        received, wanted, "Response ended early"
                    );
                    return Ok(None);
                }
                Err(_) if received == 0 => return Ok(Some(timed_out)),
                Err(_) => {
                    debug!(
                        chunk = self.descriptor.index,
                        received, wanted, "Cycle deadline reached, continuing"
                    );
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }
}
