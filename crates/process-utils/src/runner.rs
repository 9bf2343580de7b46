//! Running a child process to completion while streaming its output.
//!
//! Both pipes are drained line by line so that chatty tools such as ffmpeg
//! never block on a full pipe buffer. Carriage returns count as line breaks
//! because progress reporters rewrite a single terminal line with `\r`.
//! The last few lines of each stream are retained for error reporting.

use std::collections::VecDeque;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Number of trailing lines kept per stream.
const TAIL_LINES: usize = 20;

/// Which pipe a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Result of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout_tail: Vec<String>,
    pub stderr_tail: Vec<String>,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Trailing diagnostic output, preferring stderr when it has any.
    pub fn diagnostics(&self) -> String {
        let lines = if self.stderr_tail.is_empty() {
            &self.stdout_tail
        } else {
            &self.stderr_tail
        };
        lines.join("\n")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("process was cancelled")]
    Cancelled,
}

/// Spawn `command`, hand every output line to `on_line` and wait for exit.
///
/// When `cancel` fires the child is killed and [`RunError::Cancelled`] is
/// returned. A non-zero exit is not an error here; callers inspect
/// [`ProcessOutput::exit_code`].
pub async fn run_streaming<F>(
    mut command: Command,
    cancel: &CancellationToken,
    mut on_line: F,
) -> Result<ProcessOutput, RunError>
where
    F: FnMut(OutputStream, &str),
{
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }

    let program = command
        .as_std()
        .get_program()
        .to_string_lossy()
        .into_owned();
    let start = Instant::now();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| RunError::Spawn {
        program: program.clone(),
        source,
    })?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = child.kill().await;
        return Err(RunError::Io(std::io::Error::other(
            "child output pipes are unavailable",
        )));
    };

    let mut stdout = LineReader::new(stdout);
    let mut stderr = LineReader::new(stderr);
    let mut stdout_tail = VecDeque::with_capacity(TAIL_LINES);
    let mut stderr_tail = VecDeque::with_capacity(TAIL_LINES);
    let (mut stdout_open, mut stderr_open) = (true, true);

    while stdout_open || stderr_open {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(program = %program, "Cancellation requested, killing process");
                let _ = child.kill().await;
                return Err(RunError::Cancelled);
            }
            line = stdout.next_line(), if stdout_open => match line? {
                Some(line) => {
                    on_line(OutputStream::Stdout, &line);
                    push_tail(&mut stdout_tail, line);
                }
                None => stdout_open = false,
            },
            line = stderr.next_line(), if stderr_open => match line? {
                Some(line) => {
                    on_line(OutputStream::Stderr, &line);
                    push_tail(&mut stderr_tail, line);
                }
                None => stderr_open = false,
            },
        }
    }

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(RunError::Cancelled);
        }
        status = child.wait() => status?,
    };

    let exit_code = status.code();
    if exit_code != Some(0) {
        warn!(program = %program, "Process exited with code: {:?}", exit_code);
    }

    Ok(ProcessOutput {
        exit_code,
        stdout_tail: stdout_tail.into(),
        stderr_tail: stderr_tail.into(),
        duration: start.elapsed(),
    })
}

/// Splits a byte stream on `\n` and `\r`, skipping empty lines.
///
/// Partial lines live in `pending` so a `next_line` future dropped by
/// `select!` loses nothing.
struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    self.pending.extend_from_slice(&available[..pos]);
                    self.inner.consume(pos + 1);
                    if !self.pending.is_empty() {
                        return Ok(Some(self.take_pending()));
                    }
                }
                None => {
                    let len = available.len();
                    self.pending.extend_from_slice(available);
                    self.inner.consume(len);
                }
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

fn push_tail(tail: &mut VecDeque<String>, line: String) {
    if tail.len() == TAIL_LINES {
        tail.pop_front();
    }
    tail.push_back(line);
}
