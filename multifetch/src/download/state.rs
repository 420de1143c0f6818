//! Per-chunk state for multi-path downloads.
//!
//! Each chunk owns its descriptor. Nothing here is shared between workers:
//! the orchestrator builds the descriptors, moves each into its worker, and
//! gets a [`ChunkOutcome`] back when the worker finishes.

use std::fmt;
use std::path::{Path, PathBuf};

use super::partition::ByteRange;

/// File name of the staging store for a chunk index.
pub fn staging_file_name(index: usize) -> String {
    format!("chunk{}.part", index)
}

/// Chunk index encoded in a staging file name, if it is one.
pub fn staging_file_index(name: &str) -> Option<usize> {
    name.strip_prefix("chunk")?.strip_suffix(".part")?.parse().ok()
}

/// One chunk of a download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    /// Position in assembly order.
    pub index: usize,
    /// Bytes of the resource this chunk covers.
    pub range: ByteRange,
    /// Index of the transport path assigned to this chunk.
    pub path_index: usize,
    /// Staging store location.
    pub staging: PathBuf,
}

impl ChunkDescriptor {
    /// Describe chunk `index` staged in `staging_dir`, fetched over the path
    /// of the same index.
    pub fn new(index: usize, range: ByteRange, staging_dir: &Path) -> Self {
        Self {
            index,
            range,
            path_index: index,
            staging: staging_dir.join(staging_file_name(index)),
        }
    }

    /// Build descriptors for a partition, one per range in order.
    pub fn for_ranges(ranges: &[ByteRange], staging_dir: &Path) -> Vec<Self> {
        ranges
            .iter()
            .enumerate()
            .map(|(index, range)| Self::new(index, *range, staging_dir))
            .collect()
    }

    /// Number of bytes this chunk must retrieve.
    pub fn len(&self) -> u64 {
        self.range.len()
    }

    /// Whether the chunk covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Lifecycle of a chunk worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Created, not started.
    Pending,
    /// A cycle is in flight.
    Fetching,
    /// Flushing received bytes before advancing the cursor.
    Persisting,
    /// Waiting out the retry delay after a failed cycle.
    RetryWait,
    /// Every byte of the range is durably staged.
    Done,
}

impl WorkerState {
    /// Get a human-readable name for the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Persisting => "persisting",
            Self::RetryWait => "retry-wait",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a worker did to complete its chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    /// Chunk index.
    pub index: usize,
    /// Bytes already staged when the worker started.
    pub resumed_bytes: u64,
    /// Bytes fetched by this worker.
    pub fetched_bytes: u64,
    /// Range requests issued.
    pub requests: u32,
    /// Cycles that ended in a transient failure.
    pub failed_cycles: u32,
}

impl ChunkOutcome {
    /// Total bytes staged for the chunk.
    pub fn staged_bytes(&self) -> u64 {
        self.resumed_bytes + self.fetched_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors_follow_ranges() {
        let ranges = vec![ByteRange::inclusive(0, 32), ByteRange::inclusive(33, 65)];
        let chunks = ChunkDescriptor::for_ranges(&ranges, Path::new("/stage"));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].path_index, 1);
        assert_eq!(chunks[1].len(), 33);
        assert_eq!(chunks[1].staging, PathBuf::from("/stage/chunk1.part"));
    }

    #[test]
    fn test_staging_file_index() {
        assert_eq!(staging_file_index(&staging_file_name(7)), Some(7));
        assert_eq!(staging_file_index("chunk.part"), None);
        assert_eq!(staging_file_index("job.json"), None);
    }

    #[test]
    fn test_empty_descriptor() {
        let chunk = ChunkDescriptor::new(0, ByteRange::new(0, 0), Path::new("."));
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_worker_state_names() {
        assert_eq!(WorkerState::RetryWait.to_string(), "retry-wait");
        assert_eq!(WorkerState::Done.name(), "done");
    }

    #[test]
    fn test_outcome_staged_bytes() {
        let outcome = ChunkOutcome {
            index: 0,
            resumed_bytes: 10,
            fetched_bytes: 23,
            requests: 2,
            failed_cycles: 1,
        };
        assert_eq!(outcome.staged_bytes(), 33);
    }
}
