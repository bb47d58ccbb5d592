//! Orchestration of a longest-sequence search over `[1, n]`.
//!
//! A run owns one [`WorkPartitioner`], an optional [`SequenceLengthCache`] and
//! a [`Reducer`]; workers share them by reference for the duration of the
//! run. Each worker pulls a chunk, walks it from its highest value down,
//! inserts newly learned lengths into the cache and reports each start to the
//! reducer. The cache and reducer locks are never held together and never
//! held while pulling work.
//!
//! With one worker the traversal is exactly `n, n - 1, ..., 1`, so on equal
//! lengths the largest start wins. With several workers chunks interleave
//! and the winning start among equal lengths depends on scheduling; the
//! winning length does not.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;

use crate::{
    cache::SequenceLengthCache,
    error::{CollatzError, Result},
    evaluator::{evaluate, sequence_length},
    partition::{WorkPartitioner, DEFAULT_CHUNK_SIZE},
    reducer::{BestResult, Reducer},
    SequenceLength,
};

/// How the range is scheduled and whether lengths are memoized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One thread, every trajectory walked to 1.
    Naive,
    /// One thread, shared length cache.
    Memoized,
    /// Scoped OS threads pulling chunks, no cache.
    Threads,
    /// Rayon work stealing over the whole range, no cache.
    Pool,
    /// Rayon pool, one chunk-pulling worker per thread, shared cache.
    PoolCached,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Naive,
        Strategy::Memoized,
        Strategy::Threads,
        Strategy::Pool,
        Strategy::PoolCached,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Naive => "naive",
            Strategy::Memoized => "memoized",
            Strategy::Threads => "threads",
            Strategy::Pool => "pool",
            Strategy::PoolCached => "pool-cached",
        }
    }

    pub fn is_memoized(self) -> bool {
        matches!(self, Strategy::Memoized | Strategy::PoolCached)
    }

    pub fn is_parallel(self) -> bool {
        !matches!(self, Strategy::Naive | Strategy::Memoized)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = CollatzError;

    fn from_str(s: &str) -> Result<Self> {
        Strategy::ALL
            .into_iter()
            .find(|st| st.name() == s)
            .ok_or_else(|| CollatzError::InvalidConfig(format!("unknown strategy `{s}`")))
    }
}

/// What to do when a trajectory leaves the u64 range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Fail the run with [`CollatzError::ArithmeticOverflow`].
    #[default]
    Abort,
    /// Log the start value, leave it out of the result and carry on.
    Skip,
}

/// Cooperative stop signal shared between a caller and a running engine.
///
/// Workers check it before pulling each chunk, so a cancelled run finishes
/// the chunks already in flight and returns a partial report.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, usize::from)
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub strategy: Strategy,
    /// Ignored by the single-threaded strategies.
    pub workers: usize,
    pub chunk_size: u64,
    pub overflow: OverflowPolicy,
    /// Cache stripes; `None` picks [`crate::cache::default_shard_count`].
    pub shards: Option<usize>,
    /// Stop pulling chunks once this much time has passed since the run began.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::PoolCached,
            workers: default_workers(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overflow: OverflowPolicy::Abort,
            shards: None,
            timeout: None,
            cancel: None,
        }
    }
}

impl EngineConfig {
    pub fn new(strategy: Strategy, workers: usize) -> Self {
        Self {
            strategy,
            workers,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 && self.strategy.is_parallel() {
            return Err(CollatzError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(CollatzError::InvalidConfig(
                "chunk size must be at least 1".into(),
            ));
        }
        if self.shards == Some(0) {
            return Err(CollatzError::InvalidConfig(
                "cache shard count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Worker threads the run will actually use.
    pub fn effective_workers(&self) -> usize {
        if self.strategy.is_parallel() {
            self.workers
        } else {
            1
        }
    }
}

/// Outcome of [`Engine::run`].
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub n: u64,
    pub strategy: Strategy,
    pub workers: usize,
    pub best: BestResult,
    /// Start values whose length reached the reducer.
    pub evaluated: u64,
    /// Start values dropped under [`OverflowPolicy::Skip`].
    pub skipped: Vec<u64>,
    pub cache_entries: usize,
    /// `false` when the run was cancelled or timed out before covering `[1, n]`.
    pub completed: bool,
    pub elapsed: Duration,
}

/// Shared state of one run.
struct Run<'a> {
    partitioner: WorkPartitioner,
    cache: Option<SequenceLengthCache>,
    reducer: &'a Reducer,
    overflow: OverflowPolicy,
    cancel: Option<&'a CancelToken>,
    deadline: Option<Instant>,
    aborted: AtomicBool,
    failure: Mutex<Option<CollatzError>>,
    skipped: Mutex<Vec<u64>>,
    evaluated: AtomicU64,
}

impl Run<'_> {
    fn should_stop(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
            || self.cancel.is_some_and(CancelToken::is_cancelled)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn length_of(&self, start: u64) -> Result<SequenceLength> {
        match &self.cache {
            Some(cache) => {
                let eval = evaluate(start, cache)?;
                cache.insert_batch(&eval.new_entries);
                Ok(eval.length)
            }
            None => sequence_length(start),
        }
    }

    /// Evaluates and reports one start value. Returns `false` if the worker
    /// must stop because the run was aborted.
    fn visit(&self, start: u64, evaluated: &mut u64) -> bool {
        match self.length_of(start) {
            Ok(length) => {
                self.reducer.report(start, length);
                *evaluated += 1;
                true
            }
            Err(err @ CollatzError::ArithmeticOverflow { .. })
                if self.overflow == OverflowPolicy::Skip =>
            {
                warn!("skipping start value {start}: {err}");
                self.skipped.lock().push(start);
                true
            }
            Err(err) => {
                self.abort(err);
                false
            }
        }
    }

    fn abort(&self, err: CollatzError) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            warn!("aborting run: {err}");
            *failure = Some(err);
        }
        self.aborted.store(true, Ordering::Release);
    }

    /// Pulls chunks until the range is exhausted or the run is stopped.
    fn worker(&self, id: usize) {
        debug!("worker {id} started");
        let mut evaluated = 0u64;
        'chunks: while !self.should_stop() {
            let Some(chunk) = self.partitioner.next_chunk() else {
                break;
            };
            for start in chunk.rev() {
                if !self.visit(start, &mut evaluated) {
                    break 'chunks;
                }
            }
        }
        self.evaluated.fetch_add(evaluated, Ordering::Relaxed);
        debug!("worker {id} finished after {evaluated} start values");
    }

    /// Rayon work stealing straight over the range; the partitioner is not
    /// used and rayon decides the splits. An `Err` from any split makes
    /// rayon stop handing out the remaining starts.
    fn steal(&self, n: u64) {
        let _ = (1..=n).into_par_iter().try_for_each_init(
            || EvalCounter(0, &self.evaluated),
            |counter, start| {
                if self.should_stop() || !self.visit(start, &mut counter.0) {
                    return Err(());
                }
                Ok(())
            },
        );
    }
}

/// Flushes a per-thread evaluation count into the run total when dropped.
struct EvalCounter<'a>(u64, &'a AtomicU64);

impl Drop for EvalCounter<'_> {
    fn drop(&mut self) {
        self.1.fetch_add(self.0, Ordering::Relaxed);
    }
}

/// Longest-sequence search with a fixed configuration.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&self, n: u64) -> Result<RunReport> {
        self.run_with(n, &Reducer::new())
    }

    /// Like [`Engine::run`], calling `observer` with every new running
    /// maximum as it is found.
    pub fn run_with_observer<F>(&self, n: u64, observer: F) -> Result<RunReport>
    where
        F: Fn(BestResult) + Send + Sync + 'static,
    {
        self.run_with(n, &Reducer::with_observer(observer))
    }

    fn run_with(&self, n: u64, reducer: &Reducer) -> Result<RunReport> {
        if n == 0 {
            return Err(CollatzError::InvalidInput(
                "range upper bound must be a positive integer".into(),
            ));
        }
        let cfg = &self.config;
        let workers = cfg.effective_workers();
        let started = Instant::now();

        let run = Run {
            partitioner: WorkPartitioner::new(n, cfg.chunk_size),
            cache: cfg.strategy.is_memoized().then(|| match cfg.shards {
                Some(shards) => SequenceLengthCache::with_shards(shards),
                None => SequenceLengthCache::new(),
            }),
            reducer,
            overflow: cfg.overflow,
            cancel: cfg.cancel.as_ref(),
            deadline: cfg.timeout.map(|t| started + t),
            aborted: AtomicBool::new(false),
            failure: Mutex::new(None),
            skipped: Mutex::new(Vec::new()),
            evaluated: AtomicU64::new(0),
        };

        debug!(
            "searching [1, {n}] with strategy {} on {workers} worker(s), chunk size {}",
            cfg.strategy, cfg.chunk_size
        );

        if workers == 1 {
            catch_worker_panic(|| run.worker(0))?;
        } else {
            match cfg.strategy {
                Strategy::Threads => spawn_threads(&run, workers)?,
                Strategy::Pool => {
                    build_pool(workers)?.install(|| catch_worker_panic(|| run.steal(n)))?
                }
                _ => {
                    let pool = build_pool(workers)?;
                    catch_worker_panic(|| {
                        pool.broadcast(|ctx| run.worker(ctx.index()));
                    })?;
                }
            }
        }

        if let Some(err) = run.failure.lock().take() {
            return Err(err);
        }

        let elapsed = started.elapsed();
        let mut skipped = std::mem::take(&mut *run.skipped.lock());
        skipped.sort_unstable();
        let evaluated = run.evaluated.load(Ordering::Relaxed);
        let completed = evaluated + skipped.len() as u64 == n;
        if !completed {
            warn!("run stopped early after {evaluated} of {n} start values");
        }

        let report = RunReport {
            n,
            strategy: cfg.strategy,
            workers,
            best: reducer.snapshot(),
            evaluated,
            skipped,
            cache_entries: run.cache.as_ref().map_or(0, SequenceLengthCache::len),
            completed,
            elapsed,
        };
        info!(
            "best start {} with length {} ({} evaluated, {} cached) in {:?}",
            report.best.start,
            report.best.length,
            report.evaluated,
            report.cache_entries,
            elapsed
        );
        Ok(report)
    }
}

fn build_pool(workers: usize) -> Result<rayon::ThreadPool> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("collatz-worker-{i}"))
        .build()?)
}

fn catch_worker_panic<F: FnOnce()>(f: F) -> Result<()> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|_| CollatzError::WorkerPanicked)
}

fn spawn_threads(run: &Run<'_>, workers: usize) -> Result<()> {
    let panicked = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|id| s.spawn(move || run.worker(id)))
            .collect();
        // join every handle so the scope never re-raises a panic itself
        handles
            .into_iter()
            .map(|h| h.join())
            .filter(|r| r.is_err())
            .count()
    });
    if panicked > 0 {
        return Err(CollatzError::WorkerPanicked);
    }
    Ok(())
}

/// Longest Collatz sequence with a start in `[1, n]`, using the memoized
/// rayon engine on `worker_count` threads.
pub fn find_longest_sequence(n: u64, worker_count: usize) -> Result<BestResult> {
    let engine = Engine::new(EngineConfig::new(Strategy::PoolCached, worker_count))?;
    Ok(engine.run(n)?.best)
}
