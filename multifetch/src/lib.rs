//! multifetch - multi-path resumable downloads
//!
//! This library fetches a single remote file by splitting it into byte ranges
//! and driving each range through its own network egress path (a distinct
//! local address, typically one per physical uplink). Every range is written
//! to a durable staging file whose length doubles as the resume checkpoint, so
//! an interrupted job picks up where it stopped instead of starting over.
//!
//! # Modules
//!
//! - [`config`]: job configuration and the INI config file
//! - [`trust`]: root-of-trust loading for TLS server verification
//! - [`transport`]: local-endpoint-bound HTTP clients
//! - [`download`]: probe, partitioning, chunk workers, assembly
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: error types shared across the crate

pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod transport;
pub mod trust;

pub use download::{DownloadSummary, MultiPathDownloader, ResourceLocator};
pub use error::{FetchError, FetchResult, TransferError};
