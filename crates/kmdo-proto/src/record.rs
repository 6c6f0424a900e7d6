//! Report records emitted while a run is in progress.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::CommandStatus;

/// One executed (or dry-run) command.
///
/// Field names on the wire keep the historical kmdo report keys
/// (`out_fp`, `cmd_fp`, `cmd`, `rcode`, `uone`, `err`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    /// The `.out` artifact of the command file, whether or not it gets written.
    #[serde(rename = "out_fp")]
    pub output_path: PathBuf,

    /// The command file the command came from.
    #[serde(rename = "cmd_fp")]
    pub command_file: PathBuf,

    /// The command text as passed to the shell.
    #[serde(rename = "cmd")]
    pub command: String,

    /// Exit status, `None` in dry-run mode.
    #[serde(rename = "rcode")]
    pub exit_code: Option<i32>,

    /// The command file carries the `.uone.cmd` allow-failure marker.
    #[serde(rename = "uone")]
    pub allow_failure: bool,

    /// This command counts as a real failure.
    #[serde(rename = "err")]
    pub failed: bool,
}

impl CommandRecord {
    /// Builds a record, classifying the status against the allow-failure flag.
    pub fn new(
        output_path: PathBuf,
        command_file: PathBuf,
        command: impl Into<String>,
        status: Option<CommandStatus>,
        allow_failure: bool,
    ) -> Self {
        let failed = !allow_failure && status.is_some_and(CommandStatus::is_failure);
        Self {
            output_path,
            command_file,
            command: command.into(),
            exit_code: status.map(CommandStatus::code),
            allow_failure,
            failed,
        }
    }
}

/// Totals for a finished (or interrupted) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Command files that were fully processed.
    pub files: usize,
    /// Records pushed to the sink.
    pub commands: usize,
    /// Real failures across all processed files.
    #[serde(rename = "nerrs")]
    pub failures: usize,
    /// The run stopped early because cancellation was requested.
    pub cancelled: bool,
}

/// Exit code of a run stopped by an interrupt, as for a shell killed by SIGINT.
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

impl RunSummary {
    /// Process exit code for this run.
    ///
    /// [`INTERRUPTED_EXIT_CODE`] when cancelled, so an interrupted run never
    /// looks like a clean one. Otherwise zero on success, or the failure count
    /// clamped into the `1..=255` range.
    pub fn exit_code(&self) -> u8 {
        if self.cancelled {
            return INTERRUPTED_EXIT_CODE;
        }
        u8::try_from(self.failures).unwrap_or(u8::MAX)
    }
}
