//! # kmdo-core
//!
//! Core pipeline for kmdo: discover `.cmd` files, run the shell commands they
//! contain and persist the captured output next to each file.
//!
//! This crate provides:
//! - Path expansion for user-supplied roots
//! - The command-file grammar (line continuations, empty-file fallback)
//! - A shell executor with timeout and process-group cleanup
//! - Deterministic, lazy discovery of command files
//! - The run coordinator that classifies outcomes and writes `.out`/`.err`
//! - YAML configuration loading

pub mod artifact;
pub mod command_file;
pub mod config;
pub mod coordinator;
pub mod discovery;
mod error;
pub mod executor;
pub mod paths;

pub use artifact::{ArtifactPair, write_artifact};
pub use command_file::{CommandFile, parse_command_file};
pub use config::{KmdoConfig, ReportFormat};
pub use coordinator::{FileOutcome, RecordSink, RunCoordinator, RunOptions};
pub use discovery::{CommandFiles, DiscoveryOptions};
pub use error::{KmdoError, KmdoResult};
pub use executor::{CommandRunner, DEFAULT_SHELL, ExecutionResult, ShellExecutor};
pub use paths::resolve_path;

pub use kmdo_proto::{CommandRecord, CommandStatus, RunSummary};
pub use tokio_util::sync::CancellationToken;
