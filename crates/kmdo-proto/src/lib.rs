//! # kmdo-proto
//!
//! Shared types for the kmdo command runner.
//!
//! This crate provides:
//! - `CommandStatus`, the outcome of one shell command
//! - `CommandRecord`, the per-command report record streamed to the user
//! - `RunSummary`, the aggregate returned once a run finishes

mod record;
mod status;

pub use record::{CommandRecord, INTERRUPTED_EXIT_CODE, RunSummary};
pub use status::{CommandStatus, TIMEOUT_EXIT_CODE};
