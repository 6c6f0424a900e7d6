//! Lazy, ordered discovery of command files under a root directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::command_file::is_command_file_name;
use crate::error::{KmdoError, KmdoResult};

/// Discovery policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Only look at files directly inside the root.
    ///
    /// Set by the historical `-r/--recursive` flag, which restricts depth
    /// rather than enabling recursion.
    pub restrict_depth: bool,
    /// Skip command files whose name contains this text.
    pub exclude: Option<String>,
}

impl DiscoveryOptions {
    fn excludes(&self, name: &str) -> bool {
        self.exclude
            .as_deref()
            .is_some_and(|pattern| name.contains(pattern))
    }
}

#[derive(Debug)]
enum Entry {
    File(PathBuf),
    Dir(PathBuf),
}

/// Iterator over the command files below a root, in byte-wise lexicographic
/// order of their full paths.
///
/// Directories are read one at a time as the walk reaches them.
#[derive(Debug)]
pub struct CommandFiles {
    root: PathBuf,
    options: DiscoveryOptions,
    stack: Vec<std::vec::IntoIter<Entry>>,
    started: bool,
}

impl CommandFiles {
    pub fn new(root: impl Into<PathBuf>, options: DiscoveryOptions) -> Self {
        Self {
            root: root.into(),
            options,
            stack: Vec::new(),
            started: false,
        }
    }

    fn read_level(&self, dir: &Path, depth: usize) -> KmdoResult<std::vec::IntoIter<Entry>> {
        let read = fs::read_dir(dir).map_err(|source| KmdoError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|source| KmdoError::Discovery {
                path: dir.to_path_buf(),
                source,
            })?;
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if file_type.is_dir() {
                if !self.options.restrict_depth {
                    // Keyed with the separator so the subtree lands where its
                    // full paths sort: after `a.cmd`, before `a0.cmd`.
                    entries.push((format!("{name}/"), Entry::Dir(path)));
                }
                continue;
            }

            if !is_command_file_name(&name) {
                continue;
            }
            if self.options.excludes(&name) {
                trace!(path = %path.display(), "excluded");
                continue;
            }
            // Follows symlinks, so links to regular files still count.
            if fs::metadata(&path).is_ok_and(|meta| meta.is_file()) {
                entries.push((name, Entry::File(path)));
            }
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(dir = %dir.display(), depth, entries = entries.len(), "scanned directory");
        Ok(entries
            .into_iter()
            .map(|(_, entry)| entry)
            .collect::<Vec<_>>()
            .into_iter())
    }
}

impl Iterator for CommandFiles {
    type Item = KmdoResult<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            match self.read_level(&self.root, 0) {
                Ok(level) => self.stack.push(level),
                Err(e) => return Some(Err(e)),
            }
        }

        loop {
            let depth = self.stack.len();
            match self.stack.last_mut()?.next() {
                None => {
                    self.stack.pop();
                }
                Some(Entry::File(path)) => return Some(Ok(path)),
                Some(Entry::Dir(dir)) => match self.read_level(&dir, depth) {
                    Ok(level) => self.stack.push(level),
                    Err(e) => return Some(Err(e)),
                },
            }
        }
    }
}
