#![cfg(unix)]

mod common;

use common::RecordingProgress;
use maple_loader_lib::Error;
use maple_loader_lib::process::{OutputStream, ProcessRunner, RunMode};
use maple_loader_lib::progress::{MessageLevel, ProgressHelper, no_op_progress_callback};
use std::sync::{Arc, Mutex};

fn runner() -> ProcessRunner {
    ProcessRunner::new("", false, ProgressHelper::new(no_op_progress_callback(), 0))
}

fn argv(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_drain_collects_stdout_only() {
    let outcome = runner()
        .run(
            &argv(&["sh", "-c", "echo one; echo noise >&2; echo two; exit 3"]),
            RunMode::Drain,
        )
        .unwrap();
    assert_eq!(outcome.exit_code, 3);
    assert_eq!(outcome.stdout, "one\ntwo\n");
    assert!(!outcome.success());
}

#[test]
fn test_drain_normalises_missing_trailing_newline() {
    let outcome = runner()
        .drain(&argv(&["sh", "-c", "printf 'a\\r\\nb'"]))
        .unwrap();
    assert!(outcome.success());
    assert_eq!(outcome.stdout, "a\nb\n");
}

#[test]
fn test_stream_splits_carriage_return_progress() {
    let lines = Mutex::new(Vec::new());
    let consumer = |_: OutputStream, line: &str| lines.lock().unwrap().push(line.to_string());
    let outcome = runner()
        .stream(
            &argv(&[
                "sh",
                "-c",
                "printf 'Download [==  ] 40%%\\rDownload [====] 100%%\\rNo DFU capable USB device found\\r\\n' >&2",
            ]),
            &consumer,
        )
        .unwrap();
    assert!(outcome.success());
    assert_eq!(
        lines.into_inner().unwrap(),
        vec![
            "Download [==  ] 40%",
            "Download [====] 100%",
            "No DFU capable USB device found",
        ]
    );
}

#[test]
fn test_drain_splits_lone_carriage_returns() {
    let outcome = runner()
        .drain(&argv(&["sh", "-c", "printf 'a\\rb\\r\\nc\\n\\nd\\r'"]))
        .unwrap();
    assert_eq!(outcome.stdout, "a\nb\nc\n\nd\n");
}

#[test]
fn test_stream_delivers_both_pipes_in_order() {
    let lines = Mutex::new(Vec::new());
    let consumer = |source: OutputStream, line: &str| {
        lines.lock().unwrap().push((source, line.to_string()));
    };
    let outcome = runner()
        .stream(
            &argv(&[
                "sh",
                "-c",
                "for i in 1 2 3; do echo out$i; echo err$i >&2; done; exit 0",
            ]),
            &consumer,
        )
        .unwrap();
    assert!(outcome.success());

    let lines = lines.into_inner().unwrap();
    let stdout: Vec<_> = lines
        .iter()
        .filter(|(s, _)| *s == OutputStream::Stdout)
        .map(|(_, l)| l.as_str())
        .collect();
    let stderr: Vec<_> = lines
        .iter()
        .filter(|(s, _)| *s == OutputStream::Stderr)
        .map(|(_, l)| l.as_str())
        .collect();
    assert_eq!(stdout, vec!["out1", "out2", "out3"]);
    assert_eq!(stderr, vec!["err1", "err2", "err3"]);
}

#[test]
fn test_stream_waits_for_all_output() {
    // Output written after a pause must still arrive before the runner returns.
    let count = Mutex::new(0usize);
    let consumer = |_: OutputStream, _: &str| *count.lock().unwrap() += 1;
    runner()
        .stream(
            &argv(&["sh", "-c", "echo a; sleep 0.2; echo b >&2; sleep 0.1; echo c"]),
            &consumer,
        )
        .unwrap();
    assert_eq!(*count.lock().unwrap(), 3);
}

#[test]
fn test_missing_executable_is_a_launch_error() {
    let dir = tempfile::tempdir().unwrap();
    let runner = ProcessRunner::new(
        dir.path(),
        false,
        ProgressHelper::new(no_op_progress_callback(), 0),
    );
    let count = Mutex::new(0usize);
    let consumer = |_: OutputStream, _: &str| *count.lock().unwrap() += 1;

    let err = runner.stream(&argv(&["dfu-util", "-l"]), &consumer).unwrap_err();
    assert!(matches!(err, Error::Launch { .. }));
    assert!(err.to_string().contains("dfu-util"));
    assert_eq!(*count.lock().unwrap(), 0);

    assert!(matches!(
        runner.drain(&argv(&["dfu-util", "-l"])),
        Err(Error::Launch { .. })
    ));
}

#[test]
fn test_empty_command_is_rejected() {
    assert!(matches!(runner().drain(&[]), Err(Error::InvalidInput(_))));
    assert!(matches!(
        runner().drain(&argv(&["  ", ""])),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_signal_exit_reports_minus_one() {
    let outcome = runner().drain(&argv(&["sh", "-c", "kill -9 $$"])).unwrap();
    assert_eq!(outcome.exit_code, -1);
}

#[test]
fn test_verbose_echoes_command_line() {
    let progress = Arc::new(RecordingProgress::default());
    let runner = ProcessRunner::new("", true, ProgressHelper::new(progress.clone(), 0));
    runner
        .drain(&argv(&["sh", "", "-c", "exit 0"]))
        .unwrap();
    assert_eq!(progress.messages_at(MessageLevel::Info), vec!["sh -c exit 0"]);
}
