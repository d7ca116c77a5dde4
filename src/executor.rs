//! Child process execution.
//!
//! This module runs exactly one command as a child process and hands back
//! everything it wrote. It never looks at the output: deciding whether a
//! test passed is the job of [`crate::outcome`].
//!
//! Both pipes are drained concurrently while the child runs, so a test that
//! writes megabytes to stderr before touching stdout cannot stall on a full
//! pipe buffer.
//!
//! # Example
//!
//! ```no_run
//! use gtest_fanout::executor::{Command, execute};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cmd = Command::new("./math_test").arg("--gtest_filter=Math.Adds");
//!     let captured = execute(&cmd).await?;
//!     println!("{}", captured.stdout_lossy());
//!     Ok(())
//! }
//! ```

use std::borrow::Cow;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Errors that prevent a command from producing a [`CapturedResult`].
///
/// A command that runs and exits non-zero, or is killed by a signal, is NOT
/// an error. Those exits are captured and classified like any other.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The process could not be started (missing binary, not executable).
    #[error("Failed to launch {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process outlived its timeout and was killed.
    ///
    /// `partial` holds whatever it wrote before being killed.
    #[error("Timed out after {}s", .limit.as_secs())]
    Timeout {
        limit: Duration,
        partial: Box<CapturedResult>,
    },

    /// Reading the child's output or waiting for it failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Output the process produced before the error, if it got that far.
    ///
    /// Only a timed-out process has any; every other error yields an empty
    /// result.
    pub fn into_captured(self) -> CapturedResult {
        match self {
            ExecError::Timeout { partial, .. } => *partial,
            _ => CapturedResult::default(),
        }
    }
}

/// A command to run as a child process.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gtest_fanout::executor::Command;
///
/// let cmd = Command::new("./math_test")
///     .arg("--gtest_filter=Math.Adds")
///     .args(["--gtest_color=no"])
///     .timeout(Duration::from_secs(60));
///
/// assert_eq!(cmd.args.len(), 2);
/// assert_eq!(cmd.to_string(), "./math_test --gtest_filter=Math.Adds --gtest_color=no");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The executable to run. Not looked up through a shell.
    pub program: PathBuf,

    /// Arguments passed to the program, one token each.
    pub args: Vec<String>,

    /// Kill the process if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl Command {
    /// Creates a new command for the given program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Adds a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the execution timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the execution timeout if one is given.
    pub fn maybe_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let program = self.program.to_string_lossy();
        let words = std::iter::once(program.as_ref()).chain(self.args.iter().map(String::as_str));
        write!(f, "{}", shell_words::join(words))
    }
}

/// Everything a finished child process left behind.
///
/// The byte buffers are exactly what the process wrote; nothing is trimmed
/// or re-encoded, so failure dumps can reproduce them verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedResult {
    /// Raw standard output.
    pub stdout: Vec<u8>,

    /// Raw standard error.
    pub stderr: Vec<u8>,

    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,

    /// Terminating signal, if the process was killed by one (Unix only).
    pub signal: Option<i32>,

    /// Wall-clock time from spawn to exit.
    pub duration: Duration,
}

impl CapturedResult {
    /// Builds a result from in-memory output, as if the process exited 0.
    pub fn from_output(stdout: impl Into<Vec<u8>>, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: Some(0),
            ..Default::default()
        }
    }

    /// Standard output decoded as UTF-8, with invalid sequences replaced.
    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Standard error decoded as UTF-8, with invalid sequences replaced.
    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }

    /// Whether the process exited normally with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Human-readable description of how the process ended.
    pub fn exit_description(&self) -> String {
        match (self.exit_code, self.signal) {
            (_, Some(signal)) => format!("killed by signal {}", signal),
            (Some(code), None) => format!("exit code {}", code),
            (None, None) => "unknown exit status".to_string(),
        }
    }

    fn from_process(
        status: Option<ExitStatus>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code: status.and_then(|s| s.code()),
            signal: status.as_ref().and_then(exit_signal),
            stdout,
            stderr,
            duration,
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

/// Runs a command to completion and captures its output.
///
/// The child gets a null stdin and piped stdout/stderr. Both pipes are read
/// while waiting for the child. On timeout the child is killed and reaped,
/// and everything read up to that point is returned in the error.
///
/// # Errors
///
/// - [`ExecError::SpawnFailed`] if the process cannot be started
/// - [`ExecError::Timeout`] if it outlives [`Command::timeout`]
/// - [`ExecError::Io`] if reading its pipes fails
pub async fn execute(cmd: &Command) -> ExecResult<CapturedResult> {
    let start = Instant::now();

    let mut process = tokio::process::Command::new(&cmd.program);
    process
        .args(&cmd.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = process.spawn().map_err(|source| ExecError::SpawnFailed {
        program: cmd.program.display().to_string(),
        source,
    })?;

    debug!(command = %cmd, pid = ?child.id(), "Spawned child process");

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let finished = {
        let collect = async {
            let (status, _, _) = tokio::try_join!(
                child.wait(),
                drain(stdout_pipe, &mut stdout),
                drain(stderr_pipe, &mut stderr),
            )?;
            Ok::<_, std::io::Error>(status)
        };

        match cmd.timeout {
            Some(limit) => tokio::time::timeout(limit, collect)
                .await
                .map_err(|_| limit),
            None => Ok(collect.await),
        }
    };

    let status = match finished {
        Ok(status) => status?,
        Err(limit) => {
            if let Err(e) = child.start_kill() {
                debug!(command = %cmd, "Failed to kill timed-out child: {}", e);
            }
            let status = child.wait().await.ok();
            let partial = CapturedResult::from_process(status, stdout, stderr, start.elapsed());

            debug!(
                command = %cmd,
                stdout_bytes = partial.stdout.len(),
                stderr_bytes = partial.stderr.len(),
                "Child process timed out"
            );

            return Err(ExecError::Timeout {
                limit,
                partial: Box::new(partial),
            });
        }
    };

    let captured = CapturedResult::from_process(Some(status), stdout, stderr, start.elapsed());

    debug!(
        command = %cmd,
        status = %captured.exit_description(),
        stdout_bytes = captured.stdout.len(),
        stderr_bytes = captured.stderr.len(),
        "Child process finished"
    );

    Ok(captured)
}

/// Reads `pipe` to EOF, appending to `buf` chunk by chunk.
///
/// Every chunk is in `buf` as soon as it is read, so cancelling the future
/// keeps what has arrived so far.
async fn drain<R>(pipe: Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(());
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_quotes_arguments() {
        let cmd = Command::new("./suite").arg("--name=a b");
        assert_eq!(cmd.to_string(), "./suite '--name=a b'");
    }

    #[test]
    fn test_exit_description() {
        let mut captured = CapturedResult::from_output("", "");
        assert_eq!(captured.exit_description(), "exit code 0");

        captured.exit_code = None;
        captured.signal = Some(11);
        assert_eq!(captured.exit_description(), "killed by signal 11");

        captured.signal = None;
        assert_eq!(captured.exit_description(), "unknown exit status");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_captures_both_streams() {
        let cmd = Command::new("/bin/sh")
            .arg("-c")
            .arg("printf 'out\\n'; printf 'err\\n' >&2; exit 3");

        let captured = execute(&cmd).await.unwrap();
        assert_eq!(captured.stdout, b"out\n");
        assert_eq!(captured.stderr, b"err\n");
        assert_eq!(captured.exit_code, Some(3));
        assert_eq!(captured.signal, None);
        assert!(!captured.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_large_output_on_both_streams() {
        // Far beyond a pipe buffer on each stream; stderr first.
        let script = "head -c 1048576 /dev/zero >&2; head -c 1048576 /dev/zero";
        let cmd = Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .timeout(Duration::from_secs(30));

        let captured = execute(&cmd).await.unwrap();
        assert_eq!(captured.stdout.len(), 1 << 20);
        assert_eq!(captured.stderr.len(), 1 << 20);
        assert!(captured.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_reports_signal() {
        let cmd = Command::new("/bin/sh").arg("-c").arg("echo started; kill -KILL $$");

        let captured = execute(&cmd).await.unwrap();
        assert_eq!(captured.stdout_lossy(), "started\n");
        assert_eq!(captured.exit_code, None);
        assert_eq!(captured.signal, Some(9));
    }

    #[tokio::test]
    async fn test_execute_missing_binary() {
        let cmd = Command::new("/nonexistent/definitely_not_a_test_binary");

        let err = execute(&cmd).await.unwrap_err();
        assert!(matches!(err, ExecError::SpawnFailed { .. }));
        assert!(err.to_string().contains("definitely_not_a_test_binary"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_timeout() {
        let cmd = Command::new("/bin/sh")
            .arg("-c")
            .arg("sleep 30")
            .timeout(Duration::from_millis(200));

        let start = Instant::now();
        let err = execute(&cmd).await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_timeout_keeps_partial_output() {
        let cmd = Command::new("/bin/sh")
            .arg("-c")
            .arg("echo 'step 1'; echo 'stuck at step 2' >&2; exec sleep 30")
            .timeout(Duration::from_secs(1));

        let err = execute(&cmd).await.unwrap_err();
        assert_eq!(err.to_string(), "Timed out after 1s");

        let partial = err.into_captured();
        assert_eq!(partial.stdout_lossy(), "step 1\n");
        assert_eq!(partial.stderr_lossy(), "stuck at step 2\n");
        assert_eq!(partial.exit_code, None);
        assert_eq!(partial.signal, Some(9));
    }

    #[test]
    fn test_into_captured_is_empty_for_spawn_failure() {
        let err = ExecError::SpawnFailed {
            program: "./gone".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.into_captured(), CapturedResult::default());
    }
}
