//! Chunk planning for resumable uploads.

use driveup_common::{Error, Result};

/// Drive accepts intermediate chunks in multiples of 256 KiB.
pub const CHUNK_GRANULARITY: u64 = 256 * 1024;

/// Derived chunk size targets this fraction (1/N) of the file.
pub const DEFAULT_CHUNK_DIVISOR: u64 = 100;

/// An inclusive byte range `[start, end]` of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

#[allow(clippy::len_without_is_empty)]
impl ChunkRange {
    /// Number of bytes in the range. Never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this range of a `total`-byte file.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// `Content-Range` header value finalizing an upload with no bytes.
pub fn empty_content_range() -> &'static str {
    "bytes */0"
}

/// The ordered ranges a file is sent in.
///
/// Ranges are contiguous, ascending and non-overlapping, and together cover
/// `[0, total_size)` exactly. Every range but the last has `chunk_size`
/// bytes. An empty file has no ranges. Ranges are computed on demand, so a
/// plan is the same size whatever the number of chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Plan `total_size` bytes in chunks of `chunk_size`.
    ///
    /// # Errors
    /// - `chunk_size` is zero
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidInput(
                "Chunk size must be a positive number of bytes".to_string(),
            ));
        }

        Ok(Self {
            total_size,
            chunk_size,
        })
    }

    /// Plan `total_size` bytes with the derived chunk size.
    pub fn with_default_chunking(total_size: u64) -> Self {
        Self {
            total_size,
            chunk_size: Self::default_chunk_size(total_size),
        }
    }

    /// Chunk size used when the caller does not pick one.
    ///
    /// 1% of the file (at least one byte), rounded up to a multiple of the
    /// 256 KiB Drive granularity, then capped at the file size. Files up to
    /// 256 KiB therefore go in one chunk; larger files use 256 KiB chunks
    /// until 1% of them exceeds 256 KiB (about 25 MiB), and roughly a hundred
    /// chunks beyond that.
    pub fn default_chunk_size(total_size: u64) -> u64 {
        let target = (total_size / DEFAULT_CHUNK_DIVISOR).max(1);
        let rounded = target.div_ceil(CHUNK_GRANULARITY) * CHUNK_GRANULARITY;
        rounded.min(total_size).max(1)
    }

    /// Planned ranges in send order.
    pub fn iter(&self) -> impl Iterator<Item = ChunkRange> {
        let Self {
            total_size,
            chunk_size,
        } = *self;

        (0..total_size)
            .step_by(usize::try_from(chunk_size).unwrap_or(usize::MAX))
            .map(move |start| ChunkRange {
                start,
                end: start.saturating_add(chunk_size).min(total_size) - 1,
            })
    }

    /// Number of chunks.
    pub fn len(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size)
    }

    /// Whether there is nothing to send (empty file).
    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// Size of the file being planned.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Size of every chunk but possibly the last.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_uneven_split() {
        let plan = ChunkPlan::new(1_000_000, 300_000).unwrap();
        let ranges: Vec<(u64, u64)> = plan.iter().map(|r| (r.start, r.end)).collect();

        assert_eq!(
            ranges,
            vec![
                (0, 299_999),
                (300_000, 599_999),
                (600_000, 899_999),
                (900_000, 999_999),
            ]
        );
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.iter().nth(3).unwrap().len(), 100_000);
    }

    #[test]
    fn test_small_file_default_is_single_chunk() {
        let plan = ChunkPlan::with_default_chunking(250);

        assert_eq!(plan.len(), 1);
        let first = plan.iter().next().unwrap();
        assert_eq!(first.content_range(250), "bytes 0-249/250");
    }

    #[test]
    fn test_default_chunk_size() {
        assert_eq!(ChunkPlan::default_chunk_size(1), 1);
        assert_eq!(ChunkPlan::default_chunk_size(250), 250);
        assert_eq!(
            ChunkPlan::default_chunk_size(CHUNK_GRANULARITY),
            CHUNK_GRANULARITY
        );
        // 2.5 MiB: 1% rounds up to one granule, so ten chunks
        assert_eq!(
            ChunkPlan::default_chunk_size(CHUNK_GRANULARITY * 10),
            CHUNK_GRANULARITY
        );
        assert_eq!(ChunkPlan::with_default_chunking(CHUNK_GRANULARITY * 10).len(), 10);
        // 100 MiB -> 1 MiB, already a multiple of 256 KiB
        assert_eq!(ChunkPlan::default_chunk_size(100 * 1024 * 1024), 1024 * 1024);
        // 1% of 1 GB is 10,000,000 bytes, rounded up to 39 * 256 KiB
        assert_eq!(
            ChunkPlan::default_chunk_size(1_000_000_000),
            39 * CHUNK_GRANULARITY
        );
    }

    #[test]
    fn test_empty_file_plans_nothing() {
        let plan = ChunkPlan::with_default_chunking(0);
        assert!(plan.is_empty());
        assert_eq!(plan.total_size(), 0);

        let plan = ChunkPlan::new(0, 1024).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
        assert_eq!(plan.iter().count(), 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkPlan::new(10, 0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_chunk_larger_than_file() {
        let plan = ChunkPlan::new(10, u64::MAX).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan.iter().collect::<Vec<_>>(),
            vec![ChunkRange { start: 0, end: 9 }]
        );
    }

    #[test]
    fn test_tiny_chunks_on_large_file_are_computed_lazily() {
        let plan = ChunkPlan::new(1_000_000_000, 1).unwrap();

        assert_eq!(plan.len(), 1_000_000_000);
        assert_eq!(
            std::mem::size_of_val(&plan),
            2 * std::mem::size_of::<u64>()
        );

        let mut ranges = plan.iter();
        assert_eq!(ranges.next(), Some(ChunkRange { start: 0, end: 0 }));
        assert_eq!(ranges.next(), Some(ChunkRange { start: 1, end: 1 }));
    }

    proptest! {
        #[test]
        fn ranges_tile_the_file(total in 1u64..2_000_000, chunk in 64u64..400_000) {
            let plan = ChunkPlan::new(total, chunk).unwrap();
            let ranges: Vec<ChunkRange> = plan.iter().collect();

            prop_assert_eq!(ranges.len() as u64, plan.len());
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[ranges.len() - 1].end, total - 1);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[1].start, pair[0].end + 1);
            }
            prop_assert_eq!(ranges.iter().map(ChunkRange::len).sum::<u64>(), total);
        }

        #[test]
        fn only_last_chunk_is_short(total in 1u64..2_000_000, chunk in 64u64..400_000) {
            let plan = ChunkPlan::new(total, chunk).unwrap();
            let ranges: Vec<ChunkRange> = plan.iter().collect();
            let (last, rest) = ranges.split_last().unwrap();

            prop_assert!(rest.iter().all(|r| r.len() == chunk));
            if total % chunk == 0 {
                prop_assert_eq!(last.len(), chunk);
            } else {
                prop_assert_eq!(last.len(), total % chunk);
            }
        }

        #[test]
        fn default_plan_is_never_empty_or_oversized(total in 1u64..u64::MAX / 2) {
            let size = ChunkPlan::default_chunk_size(total);
            prop_assert!(size >= 1);
            prop_assert!(size <= total);
            prop_assert!(size == total || size % CHUNK_GRANULARITY == 0);
        }
    }
}
