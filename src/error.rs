use thiserror::Error;

/// Errors produced while searching for the longest Collatz sequence.
#[derive(Debug, Error)]
pub enum CollatzError {
    /// A start value or range bound that is not a positive integer.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An engine setting that cannot be honoured (zero workers, zero chunk size, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The 3n+1 step from `value` does not fit in a u64.
    #[error("arithmetic overflow in the trajectory of {start}: 3 * {value} + 1 exceeds u64")]
    ArithmeticOverflow { start: u64, value: u64 },

    /// A worker thread panicked; shared state can no longer be trusted.
    #[error("a worker thread panicked, aborting the run")]
    WorkerPanicked,

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("csv output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CollatzError>;
