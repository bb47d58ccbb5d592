//! Collatz trajectory walking.
//!
//! Lengths count transitions, not visited values: `1` has length 0, `2` has
//! length 1 and `9` has length 19.

use crate::{
    cache::LengthSource,
    error::{CollatzError, Result},
    SequenceLength,
};

/// Result of walking one start value against a [`LengthSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub length: SequenceLength,
    /// Every value walked before hitting 1 or a cached value, in visitation
    /// order, paired with its remaining length to 1.
    pub new_entries: Vec<(u64, SequenceLength)>,
}

/// Largest odd value whose 3n+1 successor still fits in a u64.
///
/// `u64::MAX / 3` is odd and three times it is exactly `u64::MAX`, so the
/// next odd value down is the last one that survives the step.
pub const MAX_SAFE_ODD: u64 = u64::MAX / 3 - 2;

/// One Collatz transition.
///
/// `start` is only carried into the overflow error so the caller can tell
/// which trajectory failed.
#[inline]
pub fn step(start: u64, n: u64) -> Result<u64> {
    if n % 2 == 0 {
        Ok(n >> 1)
    } else {
        n.checked_mul(3)
            .and_then(|v| v.checked_add(1))
            .ok_or(CollatzError::ArithmeticOverflow { start, value: n })
    }
}

fn check_start(start: u64) -> Result<()> {
    if start == 0 {
        return Err(CollatzError::InvalidInput(
            "start value must be a positive integer".into(),
        ));
    }
    Ok(())
}

/// Walks `start` until it reaches 1 or a value known to `cache`.
///
/// Nothing is written anywhere: the walked values come back in
/// [`Evaluation::new_entries`] and inserting them is up to the caller. If the
/// walk overflows, the whole evaluation fails and no entries are produced.
pub fn evaluate<S: LengthSource + ?Sized>(start: u64, cache: &S) -> Result<Evaluation> {
    check_start(start)?;

    let mut visited = Vec::new();
    let mut value = start;
    let tail = loop {
        if value == 1 {
            break 0;
        }
        if let Some(len) = cache.lookup(value) {
            break len;
        }
        visited.push(value);
        value = step(start, value)?;
    };

    let k = visited.len() as SequenceLength;
    let new_entries = visited
        .into_iter()
        .enumerate()
        .map(|(i, v)| (v, k - i as SequenceLength + tail))
        .collect();

    Ok(Evaluation {
        length: k + tail,
        new_entries,
    })
}

/// Sequence length of `start` without any memo.
pub fn sequence_length(start: u64) -> Result<SequenceLength> {
    check_start(start)?;
    let mut length = 0;
    let mut value = start;
    while value > 1 {
        value = step(start, value)?;
        length += 1;
    }
    Ok(length)
}

/// The whole trajectory of `start`, including `start` itself and the final 1.
pub fn trajectory(start: u64) -> Result<Vec<u64>> {
    check_start(start)?;
    let mut values = vec![start];
    let mut value = start;
    while value > 1 {
        value = step(start, value)?;
        values.push(value);
    }
    Ok(values)
}
