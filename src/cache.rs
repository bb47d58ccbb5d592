//! Shared memo of remaining sequence lengths.
//!
//! Entries are immutable once written: the trajectory from a given value is
//! deterministic, so a value always maps to the same remaining length and an
//! entry never needs invalidation. Inserts that find the key already present
//! are dropped.

use std::{collections::HashMap, hash::BuildHasherDefault, sync::OnceLock};

use parking_lot::RwLock;
use wyhash::WyHash;

use crate::SequenceLength;

type Shard = HashMap<u64, SequenceLength, BuildHasherDefault<WyHash>>;

const FIBONACCI_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Read access to known remaining lengths.
pub trait LengthSource {
    fn lookup(&self, value: u64) -> Option<SequenceLength>;
}

/// A source that knows nothing; evaluations against it walk all the way to 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl LengthSource for NoCache {
    #[inline]
    fn lookup(&self, _value: u64) -> Option<SequenceLength> {
        None
    }
}

/// Number of shards used by [`SequenceLengthCache::new`].
///
/// `4 * available_parallelism`, rounded up to a power of two.
pub fn default_shard_count() -> usize {
    static DEFAULT: OnceLock<usize> = OnceLock::new();
    *DEFAULT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 4).next_power_of_two()
    })
}

/// Thread-safe `value -> remaining length` map, striped over a power-of-two
/// number of `RwLock`ed shards.
pub struct SequenceLengthCache {
    shards: Box<[RwLock<Shard>]>,
    shift: u32,
}

impl SequenceLengthCache {
    pub fn new() -> Self {
        Self::with_shards(default_shard_count())
    }

    /// Builds a cache with `shards` stripes, rounded up to a power of two.
    pub fn with_shards(shards: usize) -> Self {
        let count = shards.max(1).next_power_of_two();
        let shards = (0..count)
            .map(|_| RwLock::new(Shard::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            shift: 64 - count.trailing_zeros(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard(&self, value: u64) -> &RwLock<Shard> {
        if self.shards.len() == 1 {
            return &self.shards[0];
        }
        // consecutive integers would otherwise pile into neighbouring shards
        let idx = (value.wrapping_mul(FIBONACCI_MIX) >> self.shift) as usize;
        &self.shards[idx]
    }

    pub fn lookup(&self, value: u64) -> Option<SequenceLength> {
        self.shard(value).read().get(&value).copied()
    }

    /// Inserts every `(value, length)` pair whose value is not cached yet.
    ///
    /// Each shard lock is held for a single entry, so a batch never blocks
    /// readers of unrelated shards.
    pub fn insert_batch(&self, entries: &[(u64, SequenceLength)]) {
        for &(value, length) in entries {
            let mut shard = self.shard(value).write();
            let stored = *shard.entry(value).or_insert(length);
            debug_assert_eq!(
                stored, length,
                "conflicting remaining length cached for {value}"
            );
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().is_empty())
    }
}

impl Default for SequenceLengthCache {
    fn default() -> Self {
        Self::new()
    }
}

impl LengthSource for SequenceLengthCache {
    #[inline]
    fn lookup(&self, value: u64) -> Option<SequenceLength> {
        SequenceLengthCache::lookup(self, value)
    }
}

impl std::fmt::Debug for SequenceLengthCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceLengthCache")
            .field("shards", &self.shards.len())
            .field("entries", &self.len())
            .finish()
    }
}
