//! Artifact paths and writes.

use std::path::{Path, PathBuf};

use crate::command_file::COMMAND_SUFFIX;
use crate::error::{KmdoError, KmdoResult};

/// The `.out` and `.err` siblings of a command file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPair {
    pub out: PathBuf,
    pub err: PathBuf,
}

impl ArtifactPair {
    /// Replaces the trailing `.cmd` of `path` with `.out` and `.err`.
    ///
    /// `a.uone.cmd` maps to `a.uone.out` / `a.uone.err`. A path without the
    /// suffix gets the extensions appended.
    pub fn for_command_file(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.strip_suffix(COMMAND_SUFFIX).unwrap_or(&name);
        Self {
            out: path.with_file_name(format!("{stem}.out")),
            err: path.with_file_name(format!("{stem}.err")),
        }
    }
}

/// Creates or truncates `path` and writes `content` to it.
pub fn write_artifact(path: &Path, content: &str) -> KmdoResult<()> {
    std::fs::write(path, content).map_err(|source| KmdoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pair_for_plain_file() {
        let pair = ArtifactPair::for_command_file(Path::new("/d/name.cmd"));
        assert_eq!(pair.out, PathBuf::from("/d/name.out"));
        assert_eq!(pair.err, PathBuf::from("/d/name.err"));
    }

    #[test]
    fn test_pair_for_allow_failure_file() {
        let pair = ArtifactPair::for_command_file(Path::new("/d/name.uone.cmd"));
        assert_eq!(pair.out, PathBuf::from("/d/name.uone.out"));
        assert_eq!(pair.err, PathBuf::from("/d/name.uone.err"));
    }

    #[test]
    fn test_only_trailing_suffix_is_replaced() {
        let pair = ArtifactPair::for_command_file(Path::new("/x.cmd/run.cmd.cmd"));
        assert_eq!(pair.out, PathBuf::from("/x.cmd/run.cmd.out"));
    }

    #[test]
    fn test_writes_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.out");
        write_artifact(&path, "hello world").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello world");
    }

    #[test]
    fn test_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.out");
        std::fs::write(&path, "old content that is longer").unwrap();
        write_artifact(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_missing_parent_is_write_error() {
        let dir = TempDir::new().unwrap();
        let err = write_artifact(&dir.path().join("nope/test.out"), "x").unwrap_err();
        assert!(matches!(err, KmdoError::Write { .. }));
    }
}
