use std::process::{Command, Output};

fn collatz(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_collatz"))
        .args(args)
        .env_remove("COLLATZ_THREADS")
        .env_remove("COLLATZ_CHUNK_SIZE")
        .output()
        .expect("failed to run collatz binary")
}

/// Exit status as the OS reports it; unix truncates to the low byte.
fn expected_code(code: i32) -> i32 {
    if cfg!(unix) {
        code & 0xff
    } else {
        code
    }
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

#[test]
fn test_no_argument() {
    let out = collatz(&[]);
    assert_eq!(out.status.code(), Some(expected_code(-2)));
    assert!(stdout(&out).contains("n - starting value of Collatz sequence"));
}

#[test]
fn test_invalid_arguments() {
    for arg in ["abc", "0", "12x"] {
        let out = collatz(&[arg]);
        assert_eq!(out.status.code(), Some(expected_code(-1)), "arg {arg}");
        let text = stdout(&out);
        assert!(text.contains(&format!("{arg} is Invalid argument.")), "{text}");
        assert!(text.contains("Syntax: "));
    }
}

#[test]
fn test_unknown_flag_is_invalid() {
    let out = collatz(&["13", "--strategy", "quantum"]);
    assert_eq!(out.status.code(), Some(expected_code(-1)));
}

#[test]
fn test_progress_and_summary_for_thirteen() {
    for strategy in ["naive", "memoized", "threads", "pool", "pool-cached"] {
        let out = collatz(&["13", "--strategy", strategy, "--threads", "1"]);
        assert!(out.status.success(), "{strategy}");
        let text = stdout(&out);
        assert!(text.contains("Thread count: 1"));
        assert!(text.contains("Basic number: 13\tSequence length: 9\n"));
        assert!(text.contains("Basic number: 11\tSequence length: 14\n"));
        assert!(text.contains("Basic number: 9\tSequence length: 19\n"));
        assert!(
            text.ends_with("\nBasic number: 9\nSequence length: 19\n"),
            "{strategy}: {text}"
        );
    }
}

#[test]
fn test_quiet_and_trace() {
    let out = collatz(&["13", "--quiet", "--trace", "--threads", "4"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(!text.contains("\tSequence length"));
    assert!(text.contains("Sequence length: 19"));
    assert!(text.contains("Sequence: 9 28 14 7 22 11 34 17 52 26 13 40 20 10 5 16 8 4 2 1"));
}

#[test]
fn test_csv_export() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("progress.csv");
    let out = collatz(&[
        "27",
        "--strategy",
        "memoized",
        "--quiet",
        "--csv",
        path.to_str().unwrap(),
    ]);
    assert!(out.status.success());

    let csv = std::fs::read_to_string(&path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("start,length"));
    assert_eq!(csv.lines().last(), Some("27,111"));
}

#[test]
fn test_negative_argument_is_invalid() {
    let out = collatz(&["-4"]);
    assert_eq!(out.status.code(), Some(expected_code(-1)));
    let text = stdout(&out);
    assert!(text.contains("-4 is Invalid argument."), "{text}");
    assert!(text.contains("Syntax: "));
}

#[test]
fn test_zero_threads_accepted_by_single_threaded_strategy() {
    let out = collatz(&["13", "--strategy", "naive", "--threads", "0"]);
    assert!(out.status.success());
    assert!(stdout(&out).ends_with("\nBasic number: 9\nSequence length: 19\n"));

    let out = collatz(&["13", "--strategy", "threads", "--threads", "0"]);
    assert_eq!(out.status.code(), Some(expected_code(-1)));
}
