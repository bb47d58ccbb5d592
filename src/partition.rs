use std::{
    ops::RangeInclusive,
    sync::atomic::{AtomicU64, Ordering},
};

/// Default number of start values handed out per chunk.
pub const DEFAULT_CHUNK_SIZE: u64 = 2000;

/// Hands out `[1, n]` in fixed-size chunks, highest values first.
///
/// Workers pull chunks concurrently; every integer in the range is returned
/// in exactly one chunk. The last chunk is shorter when `n` is not a multiple
/// of the chunk size. Once the range is exhausted, `next_chunk` keeps
/// returning `None`.
#[derive(Debug)]
pub struct WorkPartitioner {
    /// Highest start value not handed out yet; 0 once exhausted.
    cursor: AtomicU64,
    chunk_size: u64,
}

impl WorkPartitioner {
    /// `chunk_size` is clamped to at least 1.
    pub fn new(n: u64, chunk_size: u64) -> Self {
        Self {
            cursor: AtomicU64::new(n),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn next_chunk(&self) -> Option<RangeInclusive<u64>> {
        let mut hi = self.cursor.load(Ordering::Relaxed);
        loop {
            if hi == 0 {
                return None;
            }
            let lo = hi.saturating_sub(self.chunk_size - 1).max(1);
            match self.cursor.compare_exchange_weak(
                hi,
                lo - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(lo..=hi),
                Err(current) => hi = current,
            }
        }
    }

    /// Drains the partitioner from the calling thread.
    pub fn chunks(&self) -> impl Iterator<Item = RangeInclusive<u64>> + '_ {
        std::iter::from_fn(move || self.next_chunk())
    }

    /// Start values not handed out yet.
    pub fn remaining(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }
}
