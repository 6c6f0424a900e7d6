//! Run coordination: discover, parse, execute, classify, write.
//!
//! Each command file goes through the same steps. Its commands run in order
//! and every result is pushed to a [`RecordSink`] as soon as it exists. Once
//! the last command is done the combined output is written to the `.out`
//! and/or `.err` artifact:
//!
//! - any failing command ⇒ `.err`
//! - no real failure ⇒ `.out`
//!
//! Failures in allow-failure (`.uone.cmd`) files are never real, so those
//! files always get an `.out`, plus an `.err` when something failed.
//!
//! Cancellation is checked before each file and before each command. A file
//! interrupted part-way gets no artifacts.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kmdo_proto::{CommandRecord, RunSummary};

use crate::artifact::{ArtifactPair, write_artifact};
use crate::command_file::CommandFile;
use crate::discovery::{CommandFiles, DiscoveryOptions};
use crate::error::KmdoResult;
use crate::executor::{CommandRunner, ExecutionResult};

/// Receives one record per command, in execution order.
pub trait RecordSink {
    fn record(&mut self, record: &CommandRecord) -> KmdoResult<()>;
}

impl RecordSink for Vec<CommandRecord> {
    fn record(&mut self, record: &CommandRecord) -> KmdoResult<()> {
        self.push(record.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub discovery: DiscoveryOptions,
    /// Parse and report commands without running them or writing artifacts.
    pub dry_run: bool,
}

/// Aggregated output of one command file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileOutcome {
    segments: Vec<String>,
    any_failure: bool,
    real_failure: bool,
}

impl FileOutcome {
    /// Appends the command's stdout and stderr and updates the failure flags.
    pub fn push(&mut self, result: &ExecutionResult, allow_failure: bool) {
        self.segments
            .push(String::from_utf8_lossy(&result.stdout).into_owned());
        self.segments
            .push(String::from_utf8_lossy(&result.stderr).into_owned());

        let failed = result.status.is_failure();
        self.any_failure |= failed;
        self.real_failure |= failed && !allow_failure;
    }

    /// Artifact text: every stdout/stderr segment joined with a newline.
    pub fn content(&self) -> String {
        self.segments.join("\n")
    }

    /// Some command in a non-allow-failure file failed.
    pub fn real_failure(&self) -> bool {
        self.real_failure
    }

    /// Some command failed, allowed or not.
    pub fn any_failure(&self) -> bool {
        self.any_failure
    }

    pub fn writes_out(&self) -> bool {
        !self.real_failure
    }

    pub fn writes_err(&self) -> bool {
        self.any_failure
    }
}

/// Drives command files through a [`CommandRunner`].
pub struct RunCoordinator<R> {
    runner: R,
    options: RunOptions,
}

impl<R: CommandRunner> RunCoordinator<R> {
    pub fn new(runner: R, options: RunOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Discovers command files under `root` and processes them in order.
    pub async fn run(
        &self,
        root: &Path,
        sink: &mut dyn RecordSink,
        cancel: &CancellationToken,
    ) -> KmdoResult<RunSummary> {
        info!(
            root = %root.display(),
            restrict_depth = self.options.discovery.restrict_depth,
            dry_run = self.options.dry_run,
            "starting run"
        );
        let files = CommandFiles::new(root, self.options.discovery.clone());
        self.run_files(files, sink, cancel).await
    }

    /// Processes an explicit sequence of command-file paths.
    pub async fn run_files<I>(
        &self,
        files: I,
        sink: &mut dyn RecordSink,
        cancel: &CancellationToken,
    ) -> KmdoResult<RunSummary>
    where
        I: IntoIterator<Item = KmdoResult<PathBuf>>,
    {
        let mut summary = RunSummary::default();

        for path in files {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let file = CommandFile::new(path?);
            if !self.process_file(&file, sink, cancel, &mut summary).await? {
                summary.cancelled = true;
                break;
            }
            summary.files += 1;
        }

        if summary.cancelled {
            warn!(
                files = summary.files,
                failures = summary.failures,
                "run cancelled"
            );
        } else {
            info!(
                files = summary.files,
                commands = summary.commands,
                failures = summary.failures,
                "run finished"
            );
        }
        Ok(summary)
    }

    /// Returns `false` if cancellation stopped the file part-way.
    async fn process_file(
        &self,
        file: &CommandFile,
        sink: &mut dyn RecordSink,
        cancel: &CancellationToken,
        summary: &mut RunSummary,
    ) -> KmdoResult<bool> {
        let commands = file.commands()?;
        let artifacts = file.artifacts();
        debug!(
            path = %file.path().display(),
            commands = commands.len(),
            allow_failure = file.allow_failure(),
            "parsed command file"
        );

        let mut outcome = FileOutcome::default();
        for command in &commands {
            if cancel.is_cancelled() {
                debug!(path = %file.path().display(), "cancelled before command");
                return Ok(false);
            }

            let status = if self.options.dry_run {
                None
            } else {
                let result = self.runner.run(command).await?;
                outcome.push(&result, file.allow_failure());
                Some(result.status)
            };

            let record = CommandRecord::new(
                artifacts.out.clone(),
                file.path().to_path_buf(),
                command.as_str(),
                status,
                file.allow_failure(),
            );
            summary.commands += 1;
            summary.failures += usize::from(record.failed);
            sink.record(&record)?;
        }

        if !self.options.dry_run {
            write_outcome(file, &artifacts, &outcome)?;
        }
        Ok(true)
    }
}

fn write_outcome(
    file: &CommandFile,
    artifacts: &ArtifactPair,
    outcome: &FileOutcome,
) -> KmdoResult<()> {
    let content = outcome.content();
    if outcome.writes_err() {
        write_artifact(&artifacts.err, &content)?;
    }
    if outcome.writes_out() {
        write_artifact(&artifacts.out, &content)?;
    }
    info!(
        path = %file.path().display(),
        real_failure = outcome.real_failure(),
        wrote_out = outcome.writes_out(),
        wrote_err = outcome.writes_err(),
        "command file done"
    );
    Ok(())
}
