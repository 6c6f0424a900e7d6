//! YAML configuration for kmdo runs.
//!
//! Every field is optional. Command-line flags and environment variables are
//! layered on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KmdoError, KmdoResult};

/// Name of the config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "kmdo.yml";

/// Report layout written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// A YAML document, one sequence item per command
    #[default]
    Yaml,
    /// One JSON object per line
    Jsonl,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KmdoConfig {
    /// Shell that interprets each command.
    pub shell: Option<PathBuf>,
    /// Per-command timeout in seconds; fractions allowed.
    pub timeout_secs: Option<f64>,
    /// Skip command files whose name contains this text.
    pub exclude: Option<String>,
    /// Historical name: restricts discovery to the root directory.
    pub recursive: bool,
    /// Report commands without running them.
    pub dry_run: bool,
    pub format: ReportFormat,
}

impl KmdoConfig {
    pub fn from_file(path: &Path) -> KmdoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KmdoError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse_yaml(&content).map_err(|e| KmdoError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn parse_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// The configured timeout, rejecting zero, negative and non-finite values.
    pub fn timeout(&self) -> Result<Option<Duration>, String> {
        self.timeout_secs.map(parse_timeout).transpose()
    }
}

/// Converts fractional seconds into a timeout.
pub fn parse_timeout(secs: f64) -> Result<Duration, String> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {secs}"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout {secs}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full() {
        let config = KmdoConfig::parse_yaml(
            r"
shell: /bin/bash
timeout_secs: 2.5
exclude: slow
recursive: true
dry_run: true
format: jsonl
",
        )
        .unwrap();
        assert_eq!(config.shell, Some(PathBuf::from("/bin/bash")));
        assert_eq!(config.timeout().unwrap(), Some(Duration::from_millis(2500)));
        assert_eq!(config.exclude.as_deref(), Some("slow"));
        assert!(config.recursive);
        assert!(config.dry_run);
        assert_eq!(config.format, ReportFormat::Jsonl);
    }

    #[test]
    fn test_defaults() {
        let config = KmdoConfig::parse_yaml("exclude: wip\n").unwrap();
        assert_eq!(config.shell, None);
        assert_eq!(config.timeout().unwrap(), None);
        assert!(!config.recursive);
        assert_eq!(config.format, ReportFormat::Yaml);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(KmdoConfig::parse_yaml("").unwrap(), KmdoConfig::default());
        assert_eq!(KmdoConfig::parse_yaml("  \n").unwrap(), KmdoConfig::default());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(KmdoConfig::parse_yaml("shel: /bin/sh\n").is_err());
    }

    #[test]
    fn test_bad_timeouts() {
        assert!(parse_timeout(0.0).is_err());
        assert!(parse_timeout(-1.0).is_err());
        assert!(parse_timeout(f64::NAN).is_err());
        assert!(parse_timeout(f64::INFINITY).is_err());
        assert_eq!(parse_timeout(0.5).unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_file_errors_are_config_errors() {
        let dir = TempDir::new().unwrap();
        let missing = KmdoConfig::from_file(&dir.path().join("kmdo.yml")).unwrap_err();
        assert!(matches!(missing, KmdoError::Config { .. }));

        let bad = dir.path().join("bad.yml");
        std::fs::write(&bad, "timeout_secs: [1, 2]\n").unwrap();
        assert!(matches!(
            KmdoConfig::from_file(&bad),
            Err(KmdoError::Config { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "shell: sh\n").unwrap();
        let config = KmdoConfig::from_file(&path).unwrap();
        assert_eq!(config.shell, Some(PathBuf::from("sh")));
    }
}
