//! Command files and their line grammar.
//!
//! A command file holds one shell command per line. A trailing backslash
//! joins a line with the next one. A file with no commands at all runs its
//! own base name, so `ls.cmd` can stay empty and still document `ls`.

use std::path::{Path, PathBuf};

use crate::artifact::ArtifactPair;
use crate::error::{KmdoError, KmdoResult};

/// Suffix of every command file.
pub const COMMAND_SUFFIX: &str = ".cmd";

/// Marker placed before [`COMMAND_SUFFIX`] on allow-failure files.
pub const ALLOW_FAILURE_MARKER: &str = ".uone";

/// A discovered command file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFile {
    path: PathBuf,
    allow_failure: bool,
}

impl CommandFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let allow_failure = is_allow_failure_name(&file_name(&path));
        Self {
            path,
            allow_failure,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Commands of this file never count as real failures.
    pub fn allow_failure(&self) -> bool {
        self.allow_failure
    }

    pub fn artifacts(&self) -> ArtifactPair {
        ArtifactPair::for_command_file(&self.path)
    }

    /// Reads and parses the file into its command list.
    pub fn commands(&self) -> KmdoResult<Vec<String>> {
        parse_command_file(&self.path)
    }
}

/// Returns true when `name` looks like a command file.
pub fn is_command_file_name(name: &str) -> bool {
    name.ends_with(COMMAND_SUFFIX)
}

/// Returns true when `name` carries the allow-failure marker, as in `x.uone.cmd`.
pub fn is_allow_failure_name(name: &str) -> bool {
    name.strip_suffix(COMMAND_SUFFIX)
        .is_some_and(|stem| stem.ends_with(ALLOW_FAILURE_MARKER))
}

/// Reads the command file at `path` and returns its commands.
pub fn parse_command_file(path: &Path) -> KmdoResult<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| KmdoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_commands(&content, &file_name(path)))
}

/// Parses command-file text. `file_name` supplies the fallback command when
/// the text holds none.
pub fn parse_commands(content: &str, file_name: &str) -> Vec<String> {
    let trimmed: Vec<&str> = content.lines().map(str::trim).collect();
    let merged = trimmed.join("\n").replace("\\\n", "");

    let commands: Vec<String> = merged
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();

    if commands.is_empty() {
        vec![fallback_command(file_name)]
    } else {
        commands
    }
}

fn fallback_command(file_name: &str) -> String {
    let name = file_name.strip_suffix(COMMAND_SUFFIX).unwrap_or(file_name);
    let name = name.strip_suffix(ALLOW_FAILURE_MARKER).unwrap_or(name);
    name.to_string()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
