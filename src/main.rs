use std::{fs::File, path::PathBuf, process, sync::Arc, time::Duration};

use clap::{error::ErrorKind, Parser};
use log::error;

use collatz::{
    engine::default_workers, sink::CsvSink, trajectory, BestResult, Engine, EngineConfig,
    OverflowPolicy, Strategy, DEFAULT_CHUNK_SIZE,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const EXIT_INVALID_ARGUMENT: i32 = -1;
const EXIT_NO_ARGUMENT: i32 = -2;
const EXIT_RUN_FAILED: i32 = 1;

/// Find the start value in [1, n] with the longest Collatz sequence.
#[derive(Parser, Debug)]
#[command(name = "collatz", version)]
struct Cli {
    /// Upper bound of the range of start values
    #[arg(allow_negative_numbers = true)]
    n: Option<String>,

    /// naive, memoized, threads, pool or pool-cached
    #[arg(short, long, default_value_t = Strategy::PoolCached)]
    strategy: Strategy,

    /// Worker threads (defaults to available parallelism)
    #[arg(short, long, env = "COLLATZ_THREADS")]
    threads: Option<usize>,

    /// Start values handed to a worker at a time
    #[arg(long, env = "COLLATZ_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Leave out start values whose trajectory overflows u64 instead of failing
    #[arg(long)]
    skip_overflow: bool,

    /// Stop pulling work after this many milliseconds and report what was found
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Only print the final result
    #[arg(short, long)]
    quiet: bool,

    /// Also write every running maximum to this CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Print the full trajectory of the winning start value
    #[arg(long)]
    trace: bool,
}

fn program_name() -> String {
    std::env::args()
        .next()
        .unwrap_or_else(|| "collatz".to_string())
}

fn print_syntax() {
    println!(
        "Syntax: {} n - starting value of Collatz sequence",
        program_name()
    );
}

fn print_best(best: BestResult) {
    println!(
        "Basic number: {}\tSequence length: {}",
        best.start, best.length
    );
}

fn parse_bound(arg: &str) -> Option<u64> {
    arg.trim().parse::<u64>().ok().filter(|&n| n > 0)
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return 0;
        }
        Err(e) => {
            let _ = e.print();
            print_syntax();
            return EXIT_INVALID_ARGUMENT;
        }
    };

    let Some(arg) = cli.n.as_deref() else {
        print_syntax();
        return EXIT_NO_ARGUMENT;
    };
    let Some(n) = parse_bound(arg) else {
        println!("{arg} is Invalid argument.");
        print_syntax();
        return EXIT_INVALID_ARGUMENT;
    };

    let config = EngineConfig {
        strategy: cli.strategy,
        workers: cli.threads.unwrap_or_else(default_workers),
        chunk_size: cli.chunk_size,
        overflow: if cli.skip_overflow {
            OverflowPolicy::Skip
        } else {
            OverflowPolicy::Abort
        },
        timeout: cli.timeout_ms.map(Duration::from_millis),
        ..Default::default()
    };
    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            println!("{e}");
            print_syntax();
            return EXIT_INVALID_ARGUMENT;
        }
    };

    let sink = match cli.csv.as_ref().map(CsvSink::<File>::create).transpose() {
        Ok(sink) => sink.map(Arc::new),
        Err(e) => {
            error!("cannot open csv output: {e}");
            return EXIT_RUN_FAILED;
        }
    };

    println!("Strategy: {}", engine.config().strategy);
    println!("Thread count: {}", engine.config().effective_workers());
    println!();

    let quiet = cli.quiet;
    let observer_sink = sink.clone();
    let report = engine.run_with_observer(n, move |best| {
        if !quiet {
            print_best(best);
        }
        if let Some(sink) = &observer_sink {
            sink.record(best);
        }
    });
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            return EXIT_RUN_FAILED;
        }
    };

    if let Some(sink) = &sink {
        if let Err(e) = sink.flush() {
            error!("{e}");
            return EXIT_RUN_FAILED;
        }
    }

    if !report.completed {
        eprintln!(
            "search stopped early: {} of {} start values evaluated, result may not be the maximum",
            report.evaluated, n
        );
    }
    if !report.skipped.is_empty() {
        eprintln!(
            "{} start value(s) skipped after overflowing u64",
            report.skipped.len()
        );
    }

    println!();
    println!("Basic number: {}", report.best.start);
    println!("Sequence length: {}", report.best.length);

    if cli.trace && report.best.start != 0 {
        match trajectory(report.best.start) {
            Ok(values) => {
                let line = values
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("Sequence: {line}");
            }
            Err(e) => error!("{e}"),
        }
    }

    0
}

fn main() {
    env_logger::init();
    process::exit(run());
}
