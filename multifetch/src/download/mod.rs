//! Multi-path resumable downloads.
//!
//! This module provides everything between a resource address and the
//! assembled artifact:
//! - Size discovery and per-path health checks (`probe`)
//! - Byte-range partitioning (`partition`)
//! - Durable per-chunk staging stores (`staging`)
//! - The resumable per-chunk fetch loop (`worker`)
//! - Retry policies for failed cycles (`retry`)
//! - Progress aggregation and periodic reporting (`progress`)
//! - Ordered reassembly and SHA-256 verification (`assemble`, `checksum`)
//! - Job orchestration (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! MultiPathDownloader (orchestrator)
//!         │
//!         ├── ResourceProbe (HEAD over path 0)
//!         │
//!         ├── partition() ──► ChunkDescriptor × N ──► JobManifest
//!         │
//!         ├── ChunkWorker × N (one tokio task each)
//!         │       ├── RangeSource (trait)
//!         │       │       └── HttpRangeSource (TransportPath)
//!         │       ├── StagingStore (chunk<i>.part)
//!         │       └── RetryPolicy
//!         │
//!         ├── ProgressCounters ──► ProgressReporter / ProgressSink
//!         │
//!         └── Assembler (ordered concatenation)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use multifetch::config::JobConfig;
//! use multifetch::download::{MultiPathDownloader, ResourceLocator};
//!
//! let config = JobConfig::new("big.iso")
//!     .with_endpoint("192.168.1.10".parse()?)
//!     .with_endpoint("10.0.0.7".parse()?);
//! let locator = ResourceLocator::new("files.example.com:40000", "big.iso");
//!
//! let summary = MultiPathDownloader::new(config).download(&locator, None).await?;
//! println!("{} bytes in {:?}", summary.total_size, summary.elapsed);
//! ```

mod assemble;
mod checksum;
mod http;
mod manifest;
mod orchestrator;
mod partition;
mod probe;
mod progress;
mod retry;
mod source;
mod staging;
mod state;
mod worker;

pub use assemble::Assembler;
pub use checksum::{calculate_file_checksum, verify_checksum};
pub use http::{HttpRangeSource, ResourceLocator};
pub use manifest::{JobManifest, MANIFEST_FILE_NAME};
pub use orchestrator::{DownloadSummary, MultiPathDownloader};
pub use partition::{partition, ByteRange};
pub use probe::{probe_paths, PathHealth, ResourceProbe};
pub use progress::{FanoutSink, ProgressCounters, ProgressReporter, ProgressSink};
pub use retry::RetryPolicy;
pub use source::{ByteStream, ProbeResponse, RangeSource};
pub use staging::{staged_len, StagingStore};
pub use state::{
    staging_file_index, staging_file_name, ChunkDescriptor, ChunkOutcome, WorkerState,
};
pub use worker::{ChunkWorker, WorkerSettings};
