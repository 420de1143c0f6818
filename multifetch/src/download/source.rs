//! The seam between chunk workers and the network.
//!
//! Workers and the probe only see [`RangeSource`], which keeps the retry
//! loop testable with scripted sources and keeps HTTP details in
//! [`HttpRangeSource`](super::http::HttpRangeSource).

use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use super::partition::ByteRange;
use crate::error::TransferError;

/// Body of a ranged response, delivered as it arrives.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransferError>>;

/// Metadata returned by a size probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    /// Declared resource length, if the server disclosed one.
    pub content_length: Option<u64>,
    /// Whether the server advertised `Accept-Ranges: bytes`.
    pub accepts_ranges: bool,
}

/// A remote resource reachable over one transport path.
pub trait RangeSource: Send + Sync {
    /// Short label for logs, typically the local endpoint.
    fn label(&self) -> String;

    /// The resource address.
    fn url(&self) -> &str;

    /// Metadata-only request for the resource length.
    fn probe(&self) -> BoxFuture<'_, Result<ProbeResponse, TransferError>>;

    /// Request the bytes of `range` (non-empty).
    fn fetch_range(&self, range: ByteRange) -> BoxFuture<'_, Result<ByteStream, TransferError>>;
}

impl<S: RangeSource + ?Sized> RangeSource for Arc<S> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn url(&self) -> &str {
        (**self).url()
    }

    fn probe(&self) -> BoxFuture<'_, Result<ProbeResponse, TransferError>> {
        (**self).probe()
    }

    fn fetch_range(&self, range: ByteRange) -> BoxFuture<'_, Result<ByteStream, TransferError>> {
        (**self).fetch_range(range)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory sources for worker and orchestrator tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use futures::{stream, FutureExt, StreamExt};

    use super::*;

    /// What the next `fetch_range` call does.
    #[derive(Debug, Clone)]
    pub enum Step {
        /// Fail before any body arrives.
        Fail(TransferError),
        /// Deliver the requested bytes in pieces of this size.
        Serve { piece: usize },
        /// Deliver at most this many bytes, then end the body early.
        Partial(usize),
        /// Deliver this many bytes, then fail mid-stream.
        PartialThenFail(usize),
        /// Never produce a byte.
        Stall,
        /// Answer as if the range header was ignored.
        IgnoreRange,
        /// Deliver everything from the range start to the end of the resource.
        Overfill,
    }

    /// In-memory resource with a scripted sequence of behaviours.
    ///
    /// Once the script is exhausted every request is served in full.
    pub struct ScriptedSource {
        data: Arc<Vec<u8>>,
        script: Mutex<VecDeque<Step>>,
        requests: AtomicU32,
        probe: Mutex<Result<ProbeResponse, TransferError>>,
        requested: Mutex<Vec<ByteRange>>,
    }

    impl ScriptedSource {
        pub fn new(data: Vec<u8>) -> Self {
            let len = data.len() as u64;
            Self {
                data: Arc::new(data),
                script: Mutex::new(VecDeque::new()),
                requests: AtomicU32::new(0),
                probe: Mutex::new(Ok(ProbeResponse {
                    content_length: Some(len),
                    accepts_ranges: true,
                })),
                requested: Mutex::new(Vec::new()),
            }
        }

        pub fn with_script(self, steps: impl IntoIterator<Item = Step>) -> Self {
            self.script.lock().unwrap().extend(steps);
            self
        }

        pub fn with_probe(self, probe: Result<ProbeResponse, TransferError>) -> Self {
            *self.probe.lock().unwrap() = probe;
            self
        }

        pub fn requests(&self) -> u32 {
            self.requests.load(Ordering::SeqCst)
        }

        pub fn requested_ranges(&self) -> Vec<ByteRange> {
            self.requested.lock().unwrap().clone()
        }

        fn slice(&self, range: ByteRange, limit: usize) -> Vec<u8> {
            let start = range.start as usize;
            let end = (range.end_exclusive() as usize).min(self.data.len());
            let end = end.min(start.saturating_add(limit));
            self.data[start..end].to_vec()
        }
    }

    impl RangeSource for ScriptedSource {
        fn label(&self) -> String {
            "scripted".to_string()
        }

        fn url(&self) -> &str {
            "memory://resource"
        }

        fn probe(&self) -> BoxFuture<'_, Result<ProbeResponse, TransferError>> {
            let result = self.probe.lock().unwrap().clone();
            async move { result }.boxed()
        }

        fn fetch_range(
            &self,
            range: ByteRange,
        ) -> BoxFuture<'_, Result<ByteStream, TransferError>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(range);
            let step = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Step::Serve { piece: 7 });

            let result: Result<ByteStream, TransferError> = match step {
                Step::Fail(e) => Err(e),
                Step::Serve { piece } => {
                    let body = self.slice(range, usize::MAX);
                    let pieces: Vec<Result<Bytes, TransferError>> = body
                        .chunks(piece.max(1))
                        .map(|c| Ok(Bytes::copy_from_slice(c)))
                        .collect();
                    Ok(stream::iter(pieces).boxed())
                }
                Step::Partial(n) => {
                    let body = Bytes::from(self.slice(range, n));
                    Ok(stream::iter(vec![Ok(body)]).boxed())
                }
                Step::PartialThenFail(n) => {
                    let body = Bytes::from(self.slice(range, n));
                    Ok(stream::iter(vec![
                        Ok(body),
                        Err(TransferError::Read("connection reset".to_string())),
                    ])
                    .boxed())
                }
                Step::Stall => Ok(stream::pending().boxed()),
                Step::IgnoreRange => Err(TransferError::RangeIgnored),
                Step::Overfill => {
                    let body = Bytes::copy_from_slice(&self.data[range.start as usize..]);
                    Ok(stream::iter(vec![Ok(body)]).boxed())
                }
            };
            async move { result }.boxed()
        }
    }
}
