//! Shell command execution with output capture and an optional timeout.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use kmdo_proto::CommandStatus;

use crate::error::{KmdoError, KmdoResult};

/// Shell used when none is configured.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// How long to wait for pipes to drain after a timed-out process is killed.
const IO_CAPTURE_GRACE: Duration = Duration::from_secs(1);

/// Captured output and status of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: CommandStatus,
}

/// Runs one command string to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> KmdoResult<ExecutionResult>;
}

/// Runs commands through `<shell> -c <command>`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: PathBuf,
    timeout: Option<Duration>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            timeout: None,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl CommandRunner for ShellExecutor {
    async fn run(&self, command: &str) -> KmdoResult<ExecutionResult> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so a timeout can take down everything the shell started.
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(shell = %self.shell.display(), command, "spawning command");

        let mut child = cmd.spawn().map_err(|source| KmdoError::Spawn {
            shell: self.shell.clone(),
            source,
        })?;
        let pid = child.id();
        let mut stdout = Capture::spawn(child.stdout.take());
        let mut stderr = Capture::spawn(child.stderr.take());

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let exit = wait_until(&mut child, deadline)
            .await
            .map_err(|source| KmdoError::Wait {
                command: command.to_string(),
                source,
            })?;

        let mut timed_out = exit.is_none();
        if timed_out {
            warn!(command, timeout = ?self.timeout, "command timed out; killing");
            terminate(&mut child, pid).await;
        }

        let until = if timed_out {
            Some(Instant::now() + IO_CAPTURE_GRACE)
        } else {
            deadline
        };
        let mut out = stdout.finish(until).await;
        let mut err = stderr.finish(until).await;

        if !timed_out && (out.is_none() || err.is_none()) {
            // The shell is gone but a background descendant still holds a pipe.
            warn!(command, timeout = ?self.timeout, "output still open at deadline; killing");
            timed_out = true;
            terminate(&mut child, pid).await;
            let grace = Some(Instant::now() + IO_CAPTURE_GRACE);
            if out.is_none() {
                out = stdout.finish(grace).await;
            }
            if err.is_none() {
                err = stderr.finish(grace).await;
            }
        }
        stdout.abort();
        stderr.abort();

        let status = match exit {
            Some(exit) if !timed_out => classify(exit),
            _ => CommandStatus::TimedOut,
        };
        debug!(command, %status, "command finished");

        Ok(ExecutionResult {
            stdout: out.unwrap_or_default(),
            stderr: err.unwrap_or_default(),
            status,
        })
    }
}

async fn wait_until(
    child: &mut Child,
    deadline: Option<Instant>,
) -> std::io::Result<Option<ExitStatus>> {
    match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        },
        None => child.wait().await.map(Some),
    }
}

/// Kills the child's process group (unix) and the child itself, then reaps it.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            debug!(pid, "killpg failed: {}", e);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(e) = child.start_kill() {
        debug!("kill failed: {}", e);
    }
    if let Err(e) = child.wait().await {
        warn!("failed to reap killed command: {}", e);
    }
}

#[cfg(unix)]
fn classify(status: ExitStatus) -> CommandStatus {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => CommandStatus::Exited(code),
        (None, Some(signal)) => CommandStatus::Signaled(signal),
        // Stopped/continued statuses never come back from wait().
        (None, None) => CommandStatus::Exited(-1),
    }
}

#[cfg(not(unix))]
fn classify(status: ExitStatus) -> CommandStatus {
    CommandStatus::Exited(status.code().unwrap_or(-1))
}

/// Background reader draining one pipe to the end.
struct Capture(Option<JoinHandle<std::io::Result<Vec<u8>>>>);

impl Capture {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self(reader.map(|mut reader| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(buf)
            })
        }))
    }

    /// Waits for the pipe to close. Returns `None` if `until` passes first,
    /// leaving the reader running so it can be awaited again.
    async fn finish(&mut self, until: Option<Instant>) -> Option<Vec<u8>> {
        let Some(handle) = self.0.as_mut() else {
            return Some(Vec::new());
        };
        let joined = match until {
            Some(until) => tokio::time::timeout_at(until, handle).await.ok()?,
            None => handle.await,
        };
        self.0 = None;

        Some(match joined {
            Ok(Ok(buf)) => buf,
            Ok(Err(e)) => {
                warn!("output capture failed: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("output capture task failed: {}", e);
                Vec::new()
            }
        })
    }

    fn abort(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh() -> ShellExecutor {
        ShellExecutor::new()
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let result = sh().run("echo hello").await.unwrap();
        assert_eq!(result.stdout, b"hello\n");
        assert!(result.stderr.is_empty());
        assert_eq!(result.status, CommandStatus::Exited(0));
    }

    #[tokio::test]
    async fn test_captures_stderr() {
        let result = sh().run("echo error >&2").await.unwrap();
        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr, b"error\n");
    }

    #[tokio::test]
    async fn test_returns_nonzero_on_failure() {
        let result = sh().run("false").await.unwrap();
        assert_eq!(result.status, CommandStatus::Exited(1));

        let result = sh().run("exit 7").await.unwrap();
        assert_eq!(result.status, CommandStatus::Exited(7));
    }

    #[tokio::test]
    async fn test_shell_operators_are_interpreted() {
        let result = sh().run("echo a && echo b | tr a-z A-Z").await.unwrap();
        assert_eq!(result.stdout, b"a\nB\n");
    }

    #[tokio::test]
    async fn test_signal_is_reported() {
        let result = sh().run("kill -9 $$").await.unwrap();
        assert_eq!(result.status, CommandStatus::Signaled(9));
        assert_eq!(result.status.code(), -9);
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let started = std::time::Instant::now();
        let result = sh()
            .with_timeout(Some(Duration::from_millis(100)))
            .run("sleep 10")
            .await
            .unwrap();
        assert_eq!(result.status, CommandStatus::TimedOut);
        assert_eq!(result.status.code(), kmdo_proto::TIMEOUT_EXIT_CODE);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_output() {
        let result = sh()
            .with_timeout(Some(Duration::from_millis(300)))
            .run("echo partial; sleep 10")
            .await
            .unwrap();
        assert_eq!(result.status, CommandStatus::TimedOut);
        assert_eq!(result.stdout, b"partial\n");
    }

    #[tokio::test]
    async fn test_background_pipe_holder_times_out() {
        let started = std::time::Instant::now();
        let result = sh()
            .with_timeout(Some(Duration::from_millis(300)))
            .run("sleep 10 & echo done")
            .await
            .unwrap();
        assert_eq!(result.status, CommandStatus::TimedOut);
        assert_eq!(result.stdout, b"done\n");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fast_command_within_timeout() {
        let result = sh()
            .with_timeout(Some(Duration::from_secs(10)))
            .run("echo quick")
            .await
            .unwrap();
        assert_eq!(result.status, CommandStatus::Exited(0));
        assert_eq!(result.stdout, b"quick\n");
    }

    #[tokio::test]
    async fn test_shell_override() {
        let result = sh().with_shell("sh").run("echo via-path").await.unwrap();
        assert_eq!(result.stdout, b"via-path\n");
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_error() {
        let err = sh()
            .with_shell("/nonexistent/kmdo-shell")
            .run("echo hi")
            .await
            .unwrap_err();
        assert!(matches!(err, KmdoError::Spawn { .. }));
    }
}
