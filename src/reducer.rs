use parking_lot::Mutex;
use serde::Serialize;

use crate::SequenceLength;

/// The longest sequence seen so far. `start == 0` means nothing was reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BestResult {
    pub start: u64,
    pub length: SequenceLength,
}

type Observer = Box<dyn Fn(BestResult) + Send + Sync>;

/// Running maximum over `(start, length)` reports.
///
/// Only a strictly longer sequence replaces the current best, so on a tie
/// the start reported first keeps the title.
pub struct Reducer {
    best: Mutex<BestResult>,
    observer: Option<Observer>,
}

impl Reducer {
    pub fn new() -> Self {
        Self {
            best: Mutex::new(BestResult::default()),
            observer: None,
        }
    }

    /// Calls `observer` with every new best, while the reducer lock is held,
    /// so observed lengths are strictly increasing.
    pub fn with_observer<F>(observer: F) -> Self
    where
        F: Fn(BestResult) + Send + Sync + 'static,
    {
        Self {
            best: Mutex::new(BestResult::default()),
            observer: Some(Box::new(observer)),
        }
    }

    /// Returns `true` if `length` became the new best.
    pub fn report(&self, start: u64, length: SequenceLength) -> bool {
        let mut best = self.best.lock();
        if start == 0 || (best.start != 0 && length <= best.length) {
            return false;
        }
        *best = BestResult { start, length };
        if let Some(observer) = &self.observer {
            observer(*best);
        }
        true
    }

    pub fn snapshot(&self) -> BestResult {
        *self.best.lock()
    }
}

impl Default for Reducer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reducer")
            .field("best", &self.snapshot())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}
