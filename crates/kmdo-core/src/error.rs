use std::path::PathBuf;

use thiserror::Error;

pub type KmdoResult<T> = Result<T, KmdoError>;

/// Fatal errors. Any of these aborts the run.
///
/// Non-zero exits and timeouts are not errors; they are recorded as
/// [`kmdo_proto::CommandStatus`] values.
#[derive(Debug, Error)]
pub enum KmdoError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("failed to read command file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn shell {}: {source}", shell.display())]
    Spawn {
        shell: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed waiting for command '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to emit report: {0}")]
    Report(#[source] std::io::Error),

    #[error("invalid config {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

impl KmdoError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        KmdoError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
