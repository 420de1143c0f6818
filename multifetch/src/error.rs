//! Error types for multi-path downloads.
//!
//! Errors fall into two families:
//!
//! - [`TransferError`]: a single fetch cycle failed. These are recovered
//!   inside the chunk worker and never reach the caller on their own.
//! - [`FetchError`]: the job cannot continue. Setup failures, storage
//!   failures and assembly failures all land here, tagged with the stage
//!   that failed.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for job-level operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Fatal errors that abort a download job.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A local endpoint could not be resolved or bound.
    #[error("failed to bind local endpoint {endpoint}: {source}")]
    EndpointBind {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// The pinned certificate could not be loaded.
    #[error("failed to load trust material from {}: {reason}", path.display())]
    TrustLoad { path: PathBuf, reason: String },

    /// The HTTP client for a path could not be constructed.
    #[error("failed to build transport for {endpoint}: {reason}")]
    TransportBuild { endpoint: String, reason: String },

    /// The size probe failed at the network or protocol level.
    #[error("probe of {url} failed: {reason}")]
    Probe { url: String, reason: String },

    /// The server did not disclose a usable resource length.
    #[error("server did not disclose the size of {url}")]
    UnknownSize { url: String },

    /// The server answered a ranged request for a non-zero offset with the
    /// full resource, or with a shifted range, so the chunk can never be
    /// completed correctly.
    #[error("server ignored the byte range for chunk {chunk} of {url}")]
    RangeIgnored { chunk: usize, url: String },

    /// A bounded retry policy gave up on a chunk.
    #[error("chunk {chunk} gave up after {attempts} failed cycles without progress: {last_error}")]
    RetriesExhausted {
        chunk: usize,
        attempts: u32,
        last_error: TransferError,
    },

    /// A staging store could not be opened, written, flushed or closed.
    #[error("staging store {} failed: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A staging store does not hold exactly its chunk's bytes at assembly.
    #[error("chunk {chunk} is incomplete: staged {staged} of {expected} bytes")]
    IncompleteChunk {
        chunk: usize,
        staged: u64,
        expected: u64,
    },

    /// Reading staging data into, or writing, the output artifact failed.
    #[error("assembly of {} failed: {source}", path.display())]
    Assembly {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The assembled artifact does not match the expected checksum.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The job manifest could not be read or written.
    #[error("job manifest {} is unusable: {reason}", path.display())]
    Manifest { path: PathBuf, reason: String },

    /// No transport paths were configured.
    #[error("no transport paths available")]
    NoPaths,

    /// A chunk worker task panicked or was cancelled.
    #[error("worker for chunk {chunk} stopped unexpectedly: {reason}")]
    WorkerAborted { chunk: usize, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FetchError {
    /// Short name of the stage that failed, for user-facing reports.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::EndpointBind { .. } | Self::TransportBuild { .. } => "transport setup",
            Self::TrustLoad { .. } => "trust setup",
            Self::Probe { .. } | Self::UnknownSize { .. } => "probe",
            Self::RangeIgnored { .. } | Self::RetriesExhausted { .. } => "transfer",
            Self::Storage { .. } | Self::WorkerAborted { .. } => "staging",
            Self::IncompleteChunk { .. } | Self::Assembly { .. } => "assembly",
            Self::ChecksumMismatch { .. } => "verification",
            Self::Manifest { .. } => "resume",
            Self::NoPaths | Self::InvalidConfig(_) => "configuration",
        }
    }
}

/// A failure confined to one fetch cycle of one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The request could not be built or sent, or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The server answered with an unexpected status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The response body stream failed mid-transfer.
    #[error("read failed: {0}")]
    Read(String),

    /// The response ended before delivering any byte.
    #[error("empty response body")]
    EmptyBody,

    /// The cycle deadline elapsed before a terminal outcome.
    #[error("cycle deadline of {0:?} elapsed")]
    CycleTimeout(Duration),

    /// The server sent the whole resource or a different range than requested.
    #[error("range request answered with full content or a different range")]
    RangeIgnored,
}

impl TransferError {
    /// Whether retrying the same request can ever succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::RangeIgnored)
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_body() || e.is_decode() {
            TransferError::Read(e.to_string())
        } else {
            TransferError::Request(e.to_string())
        }
    }
}
