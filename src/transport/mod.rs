use std::io::{BufRead, BufReader, Lines, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// How long a single SSH call may run before the caller is unwedged.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("empty command")]
    EmptyCommand,
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("command timed out after {0:?}")]
    TimedOut(Duration),
    #[error("command failed with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Captured result of a finished command.
#[derive(Debug)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

fn spawn(argv: &[String]) -> Result<Child> {
    let (program, args) = argv.split_first().ok_or(TransportError::EmptyCommand)?;
    debug!(command = %argv.join(" "), "spawning");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TransportError::Spawn {
            program: program.clone(),
            source,
        })
}

/// Drain a pipe on a helper thread so the child never blocks on a full pipe
/// while we poll for its exit.
fn drain<R: Read + Send + 'static>(reader: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut reader = reader;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).ok();
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Wait for a child with a bounded, polled wait. Kills the child on timeout.
fn wait_bounded(child: &mut Child, timeout: Duration) -> Result<std::process::ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            child.wait().ok();
            return Err(TransportError::TimedOut(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Run a command to completion, blocking the caller for at most the default
/// timeout. Non-zero exit surfaces as `Failed` with the captured stderr.
pub fn execute(argv: &[String]) -> Result<Output> {
    execute_with_timeout(argv, DEFAULT_TIMEOUT)
}

pub fn execute_with_timeout(argv: &[String], timeout: Duration) -> Result<Output> {
    let mut child = spawn(argv)?;
    let stdout = drain(child.stdout.take().expect("stdout piped"));
    let stderr = drain(child.stderr.take().expect("stderr piped"));

    let status = wait_bounded(&mut child, timeout)?;
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    if !status.success() {
        return Err(TransportError::Failed {
            status: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(Output { stdout, stderr })
}

/// A line iterator over a running command's stdout.
///
/// Query output is line-delimited JSON and may be large, so the caller reads
/// it incrementally instead of buffering the whole response. After the lines
/// are exhausted, `finish` reaps the child and reports a non-zero exit.
pub struct LineStream {
    child: Child,
    lines: Option<Lines<BufReader<ChildStdout>>>,
    stderr: Option<JoinHandle<String>>,
}

impl LineStream {
    /// Wait for the child to exit and check its status.
    pub fn finish(mut self) -> Result<()> {
        // Drop the stdout reader first so a child blocked on a full pipe
        // can make progress toward exit.
        self.lines.take();
        let status = wait_bounded(&mut self.child, DEFAULT_TIMEOUT)?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(TransportError::Failed {
                status: status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Iterator for LineStream {
    type Item = std::io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.as_mut()?.next()
    }
}

impl Drop for LineStream {
    fn drop(&mut self) {
        // Reap an abandoned child; harmless after finish() already waited.
        if matches!(self.child.try_wait(), Ok(None)) {
            self.child.kill().ok();
            self.child.wait().ok();
        }
        if let Some(handle) = self.stderr.take() {
            handle.join().ok();
        }
    }
}

/// Run a command whose stdout is consumed line by line.
pub fn stream_lines(argv: &[String]) -> Result<LineStream> {
    let mut child = spawn(argv)?;
    let stdout = child.stdout.take().expect("stdout piped");
    let stderr = drain(child.stderr.take().expect("stderr piped"));
    Ok(LineStream {
        child,
        lines: Some(BufReader::new(stdout).lines()),
        stderr: Some(stderr),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn execute_captures_stdout() {
        let out = execute(&argv(&["echo", "hello"])).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn execute_rejects_empty_argv() {
        assert!(matches!(
            execute(&[]),
            Err(TransportError::EmptyCommand)
        ));
    }

    #[test]
    fn nonzero_exit_carries_stderr() {
        let err = execute(&argv(&["sh", "-c", "echo boom >&2; exit 3"])).unwrap_err();
        match err {
            TransportError::Failed { status, stderr } => {
                assert_eq!(status, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn spawn_failure_is_reported() {
        let err = execute(&argv(&["definitely-not-a-real-binary-xyz"])).unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }

    #[test]
    fn timeout_kills_the_child() {
        let err =
            execute_with_timeout(&argv(&["sleep", "5"]), Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, TransportError::TimedOut(_)));
    }

    #[test]
    fn stream_yields_lines_in_order() {
        let stream = stream_lines(&argv(&["sh", "-c", "printf 'one\\ntwo\\n'"])).unwrap();
        let mut lines = Vec::new();
        let mut stream = stream;
        for line in &mut stream {
            lines.push(line.unwrap());
        }
        stream.finish().unwrap();
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn stream_finish_reports_failure() {
        let mut stream = stream_lines(&argv(&["sh", "-c", "echo partial; exit 1"])).unwrap();
        for line in &mut stream {
            line.unwrap();
        }
        assert!(matches!(
            stream.finish(),
            Err(TransportError::Failed { status: 1, .. })
        ));
    }
}
