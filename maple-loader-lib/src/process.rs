//! Subprocess execution with drained or streamed output.

use crate::progress::ProgressHelper;
use crate::{Error, Result};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use tracing::debug;

/// Which pipe a streamed line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives every line of a streamed run as soon as it is read.
///
/// Called concurrently from the stdout and stderr reader threads.
pub type LineConsumer<'a> = dyn Fn(OutputStream, &str) + Sync + 'a;

pub enum RunMode<'a> {
    /// Collect stdout into [`ProcessOutcome::stdout`]; stderr is discarded.
    Drain,
    /// Push stdout and stderr lines to the consumer while the process runs.
    Stream(&'a LineConsumer<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code, or -1 when the process was terminated by a signal.
    pub exit_code: i32,
    /// Captured stdout in drain mode, one `\n` per line; empty when streamed.
    pub stdout: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub struct ProcessRunner {
    base_path: PathBuf,
    verbose: bool,
    progress: ProgressHelper,
}

impl ProcessRunner {
    /// `base_path` is prepended to `argv[0]`; an empty path leaves the lookup to `PATH`.
    pub fn new(base_path: impl Into<PathBuf>, verbose: bool, progress: ProgressHelper) -> Self {
        Self {
            base_path: base_path.into(),
            verbose,
            progress,
        }
    }

    pub fn run(&self, argv: &[String], mode: RunMode<'_>) -> Result<ProcessOutcome> {
        let argv: Vec<&str> = argv
            .iter()
            .map(|arg| arg.trim())
            .filter(|arg| !arg.is_empty())
            .collect();
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::invalid_input("empty command line"));
        };
        let program = self.resolve(program);

        let command_line = std::iter::once(program.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("running {}", command_line);
        if self.verbose {
            self.progress.info(command_line);
        }

        match mode {
            RunMode::Drain => self.run_drain(&program, args),
            RunMode::Stream(consumer) => self.run_stream(&program, args, consumer),
        }
    }

    pub fn drain(&self, argv: &[String]) -> Result<ProcessOutcome> {
        self.run(argv, RunMode::Drain)
    }

    pub fn stream(&self, argv: &[String], consumer: &LineConsumer<'_>) -> Result<ProcessOutcome> {
        self.run(argv, RunMode::Stream(consumer))
    }

    fn resolve(&self, program: &str) -> String {
        if self.base_path.as_os_str().is_empty() {
            program.to_string()
        } else {
            self.base_path.join(program).to_string_lossy().into_owned()
        }
    }

    fn run_drain(&self, program: &str, args: &[&str]) -> Result<ProcessOutcome> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::launch(program, e))?;

        let read: Result<String> = match child.stdout.take() {
            Some(stdout) => read_lines(stdout, |line| format!("{line}\n"))
                .map(|lines| lines.concat()),
            None => Ok(String::new()),
        };
        let status = wait_for_exit(&mut child)?;
        let stdout = read?;

        Ok(ProcessOutcome {
            exit_code: exit_code(status),
            stdout,
        })
    }

    fn run_stream(
        &self,
        program: &str,
        args: &[&str],
        consumer: &LineConsumer<'_>,
    ) -> Result<ProcessOutcome> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::launch(program, e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both readers must hit end-of-stream before the exit code is trusted.
        let (out_result, err_result) = thread::scope(|scope| {
            let out = scope.spawn(|| pump(stdout, OutputStream::Stdout, consumer));
            let err = scope.spawn(|| pump(stderr, OutputStream::Stderr, consumer));
            (out.join(), err.join())
        });

        let exit_code = exit_code(wait_for_exit(&mut child)?);

        for (name, joined) in [("stdout", out_result), ("stderr", err_result)] {
            let reason = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "reader thread panicked".to_string(),
            };
            return Err(Error::ReaderFailed {
                stream: format!("{program} {name}"),
                exit_code,
                reason,
            });
        }

        Ok(ProcessOutcome {
            exit_code,
            stdout: String::new(),
        })
    }
}

fn pump<R: Read>(
    stream: Option<R>,
    source: OutputStream,
    consumer: &LineConsumer<'_>,
) -> Result<()> {
    let Some(stream) = stream else {
        return Ok(());
    };
    read_lines(stream, |line| consumer(source, line))?;
    Ok(())
}

/// Reads `stream` to the end, one line at a time, tolerating invalid UTF-8.
///
/// `\n`, `\r\n` and a lone `\r` all end a line, so carriage-return progress
/// bars arrive as separate updates instead of one line at exit.
fn read_lines<R: Read, T>(stream: R, mut on_line: impl FnMut(&str) -> T) -> Result<Vec<T>> {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    let mut out = Vec::new();
    let mut after_cr = false;
    loop {
        let chunk = match reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if chunk.is_empty() {
            break;
        }
        for &byte in chunk {
            match byte {
                b'\n' if after_cr => after_cr = false,
                b'\r' | b'\n' => {
                    after_cr = byte == b'\r';
                    out.push(on_line(&String::from_utf8_lossy(&line)));
                    line.clear();
                }
                _ => {
                    after_cr = false;
                    line.push(byte);
                }
            }
        }
        let used = chunk.len();
        reader.consume(used);
    }
    if !line.is_empty() {
        out.push(on_line(&String::from_utf8_lossy(&line)));
    }
    Ok(out)
}

fn wait_for_exit(child: &mut Child) -> Result<ExitStatus> {
    loop {
        match child.wait() {
            Ok(status) => return Ok(status),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}
