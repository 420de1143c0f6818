//! Byte-range partitioning.
//!
//! A resource of `total` bytes is split into exactly `n` contiguous ranges,
//! one per transport path. Every range but the last has `total / n` bytes;
//! the last absorbs the remainder. When `total < n` the leading ranges are
//! empty and complete from the start.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// A contiguous byte range `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte offset.
    pub start: u64,
    /// Number of bytes; zero for an empty range.
    pub len: u64,
}

impl ByteRange {
    /// Create a range of `len` bytes starting at `start`.
    pub fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// Range between two inclusive offsets.
    pub fn inclusive(start: u64, end: u64) -> Self {
        debug_assert!(end >= start);
        Self::new(start, end - start + 1)
    }

    /// Number of bytes in the range.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the range holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset one past the last byte.
    pub fn end_exclusive(&self) -> u64 {
        self.start + self.len
    }

    /// Offset of the last byte, `None` for an empty range.
    pub fn end_inclusive(&self) -> Option<u64> {
        self.len.checked_sub(1).map(|last| self.start + last)
    }

    /// The part of this range left after `cursor` bytes are retrieved.
    ///
    /// `None` once nothing remains.
    pub fn remaining(&self, cursor: u64) -> Option<ByteRange> {
        (cursor < self.len).then(|| ByteRange::new(self.start + cursor, self.len - cursor))
    }

    /// The `Range` header value for this range, `None` if empty.
    pub fn header_value(&self) -> Option<String> {
        self.end_inclusive()
            .map(|end| format!("bytes={}-{}", self.start, end))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_inclusive() {
            Some(end) => write!(f, "[{}, {}]", self.start, end),
            None => write!(f, "[{}, empty]", self.start),
        }
    }
}

/// Split `[0, total)` into `n` contiguous, non-overlapping ranges.
pub fn partition(total: u64, n: NonZeroUsize) -> Vec<ByteRange> {
    let n = n.get() as u64;
    let chunk = total / n;

    (0..n)
        .map(|i| {
            let start = i * chunk;
            let len = if i == n - 1 { total - start } else { chunk };
            ByteRange::new(start, len)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    fn inclusive_bounds(ranges: &[ByteRange]) -> Vec<(u64, u64)> {
        ranges
            .iter()
            .map(|r| (r.start, r.end_inclusive().unwrap()))
            .collect()
    }

    #[test]
    fn test_three_way_split_of_100() {
        let ranges = partition(100, n(3));
        assert_eq!(inclusive_bounds(&ranges), vec![(0, 32), (33, 65), (66, 99)]);
        let lens: Vec<u64> = ranges.iter().map(ByteRange::len).collect();
        assert_eq!(lens, vec![33, 33, 34]);
    }

    #[test]
    fn test_last_range_absorbs_remainder() {
        let lens: Vec<u64> = partition(10, n(4)).iter().map(ByteRange::len).collect();
        assert_eq!(lens, vec![2, 2, 2, 4]);
    }

    #[test]
    fn test_single_path_spans_everything() {
        let ranges = partition(12345, n(1));
        assert_eq!(ranges, vec![ByteRange::new(0, 12345)]);
    }

    #[test]
    fn test_fewer_bytes_than_paths() {
        let ranges = partition(3, n(5));
        assert_eq!(ranges.len(), 5);
        assert!(ranges[..4].iter().all(ByteRange::is_empty));
        assert_eq!(ranges[4], ByteRange::new(0, 3));
    }

    #[test]
    fn test_empty_resource() {
        let ranges = partition(0, n(3));
        assert_eq!(ranges.len(), 3);
        assert!(ranges.iter().all(ByteRange::is_empty));
    }

    #[test]
    fn test_remaining_and_header() {
        let range = ByteRange::inclusive(33, 65);
        assert_eq!(range.header_value().as_deref(), Some("bytes=33-65"));
        assert_eq!(range.remaining(0), Some(range));
        assert_eq!(range.remaining(10), Some(ByteRange::inclusive(43, 65)));
        assert_eq!(range.remaining(33), None);
        assert_eq!(ByteRange::new(7, 0).header_value(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteRange::inclusive(0, 32).to_string(), "[0, 32]");
        assert_eq!(ByteRange::new(4, 0).to_string(), "[4, empty]");
    }

    proptest! {
        #[test]
        fn prop_partition_is_exact(total in 0u64..10_000_000, paths in 1usize..64) {
            let ranges = partition(total, n(paths));

            prop_assert_eq!(ranges.len(), paths);

            let mut expected_start = 0;
            for range in &ranges {
                prop_assert!(range.start <= expected_start || range.is_empty());
                if !range.is_empty() {
                    prop_assert_eq!(range.start, expected_start);
                    expected_start = range.end_exclusive();
                }
            }
            prop_assert_eq!(expected_start, total);
            prop_assert_eq!(ranges.iter().map(ByteRange::len).sum::<u64>(), total);
        }

        #[test]
        fn prop_imbalance_only_in_last(total in 0u64..1_000_000, paths in 1usize..32) {
            let ranges = partition(total, n(paths));
            let first = ranges[0].len();
            for range in &ranges[..paths - 1] {
                prop_assert_eq!(range.len(), first);
            }
            prop_assert!(ranges[paths - 1].len() >= first);
            prop_assert!(ranges[paths - 1].len() < first + paths as u64);
        }
    }
}
