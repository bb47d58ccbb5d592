//! Longest Collatz sequence search.
//!
//! The core is a memoized, multi-threaded engine: a striped cache of
//! remaining sequence lengths shared by all workers, a chunked partition of
//! `[1, n]` that workers pull from, and a synchronized running maximum.
//!
//! ```
//! let best = collatz::find_longest_sequence(13, 4).unwrap();
//! assert_eq!((best.start, best.length), (9, 19));
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod partition;
pub mod reducer;
pub mod sink;

/// Number of Collatz steps from a value down to 1.
pub type SequenceLength = u32;

pub use cache::{LengthSource, NoCache, SequenceLengthCache};
pub use engine::{
    find_longest_sequence, CancelToken, Engine, EngineConfig, OverflowPolicy, RunReport, Strategy,
};
pub use error::{CollatzError, Result};
pub use evaluator::{evaluate, sequence_length, trajectory, Evaluation};
pub use partition::{WorkPartitioner, DEFAULT_CHUNK_SIZE};
pub use reducer::{BestResult, Reducer};
