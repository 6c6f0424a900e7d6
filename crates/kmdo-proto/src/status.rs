//! Exit status of a single executed command.

use std::fmt;

/// Exit code reported for a command that was killed after its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// How a command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The shell exited on its own with this code.
    Exited(i32),
    /// The shell was terminated by this signal number.
    Signaled(i32),
    /// The command outlived its timeout and was killed.
    TimedOut,
}

impl CommandStatus {
    /// Integer form used in reports.
    ///
    /// Signals are reported as negative numbers and timeouts as
    /// [`TIMEOUT_EXIT_CODE`].
    pub fn code(self) -> i32 {
        match self {
            CommandStatus::Exited(code) => code,
            CommandStatus::Signaled(signal) => -signal,
            CommandStatus::TimedOut => TIMEOUT_EXIT_CODE,
        }
    }

    /// Returns true for anything other than a clean zero exit.
    pub fn is_failure(self) -> bool {
        !matches!(self, CommandStatus::Exited(0))
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandStatus::Exited(code) => write!(f, "exit {code}"),
            CommandStatus::Signaled(signal) => write!(f, "signal {signal}"),
            CommandStatus::TimedOut => write!(f, "timed out"),
        }
    }
}
