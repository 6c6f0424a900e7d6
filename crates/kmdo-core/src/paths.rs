//! Expansion of user-supplied paths into absolute, normalized form.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{KmdoError, KmdoResult};

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:\{([^}]*)\}|([A-Za-z_][A-Za-z0-9_]*))").expect("valid variable pattern")
});

/// Expands `$VAR`, `${VAR}` and a leading `~`, then makes the result absolute
/// against the current directory with `.` and `..` folded away.
///
/// Symlinks are left alone.
pub fn resolve_path(input: &str) -> KmdoResult<PathBuf> {
    let cwd = std::env::current_dir()
        .map_err(|e| KmdoError::invalid_path(input, format!("no current directory: {e}")))?;
    resolve_path_with(input, |name| std::env::var(name).ok(), dirs::home_dir(), &cwd)
}

/// [`resolve_path`] with the environment, home directory and base directory
/// supplied by the caller.
pub fn resolve_path_with<F>(
    input: &str,
    lookup: F,
    home: Option<PathBuf>,
    cwd: &Path,
) -> KmdoResult<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if input.trim().is_empty() {
        return Err(KmdoError::invalid_path(input, "path is empty"));
    }

    let expanded = expand_vars(input, &lookup)?;
    let expanded = expand_tilde(input, &expanded, home)?;

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };
    Ok(normalize(&absolute))
}

fn expand_vars<F>(input: &str, lookup: &F) -> KmdoResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    let push_literal = |out: &mut String, literal: &str| {
        if literal.contains("${") {
            return Err(KmdoError::invalid_path(input, "unterminated '${' reference"));
        }
        out.push_str(literal);
        Ok(())
    };

    for caps in VAR_PATTERN.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("", |m| m.as_str());
        if name.is_empty() {
            return Err(KmdoError::invalid_path(input, "empty variable reference '${}'"));
        }
        let value = lookup(name).ok_or_else(|| {
            KmdoError::invalid_path(input, format!("environment variable '{name}' is not set"))
        })?;
        push_literal(&mut out, &input[last..whole.start()])?;
        out.push_str(&value);
        last = whole.end();
    }
    push_literal(&mut out, &input[last..])?;
    Ok(out)
}

fn expand_tilde(input: &str, text: &str, home: Option<PathBuf>) -> KmdoResult<PathBuf> {
    let rest = match text.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Ok(PathBuf::from(text)),
    };
    let home = home.ok_or_else(|| KmdoError::invalid_path(input, "home directory is unknown"))?;
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "DOCS" => Some("/srv/docs".to_string()),
            "SUB" => Some("guide".to_string()),
            _ => None,
        }
    }

    fn resolve(input: &str) -> KmdoResult<PathBuf> {
        resolve_path_with(input, env, Some(PathBuf::from("/home/kmdo")), Path::new("/work"))
    }

    #[test]
    fn test_relative_is_joined_to_cwd() {
        assert_eq!(resolve("cmds").unwrap(), PathBuf::from("/work/cmds"));
    }

    #[test]
    fn test_dot_segments_are_folded() {
        assert_eq!(resolve("./a/../b/.").unwrap(), PathBuf::from("/work/b"));
        assert_eq!(resolve("/../../x").unwrap(), PathBuf::from("/x"));
    }

    #[test]
    fn test_tilde_expands_to_home() {
        assert_eq!(resolve("~").unwrap(), PathBuf::from("/home/kmdo"));
        assert_eq!(resolve("~/docs").unwrap(), PathBuf::from("/home/kmdo/docs"));
    }

    #[test]
    fn test_tilde_user_is_left_alone() {
        assert_eq!(resolve("~other/x").unwrap(), PathBuf::from("/work/~other/x"));
    }

    #[test]
    fn test_variables_expand() {
        assert_eq!(resolve("$DOCS/cmd").unwrap(), PathBuf::from("/srv/docs/cmd"));
        assert_eq!(resolve("${DOCS}/${SUB}").unwrap(), PathBuf::from("/srv/docs/guide"));
    }

    #[test]
    fn test_unset_variable_is_invalid() {
        let err = resolve("$NOPE/x").unwrap_err();
        assert!(matches!(err, KmdoError::InvalidPath { .. }));
        assert!(err.to_string().contains("NOPE"));
    }

    #[test]
    fn test_unterminated_brace_is_invalid() {
        assert!(matches!(resolve("${DOCS"), Err(KmdoError::InvalidPath { .. })));
    }

    #[test]
    fn test_empty_path_is_invalid() {
        assert!(matches!(resolve("  "), Err(KmdoError::InvalidPath { .. })));
    }

    #[test]
    fn test_missing_home_is_invalid() {
        let err = resolve_path_with("~/x", env, None, Path::new("/work")).unwrap_err();
        assert!(err.to_string().contains("home"));
    }

    #[test]
    fn test_real_environment() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().to_str().unwrap().to_string();
        assert_eq!(resolve_path(&input).unwrap(), dir.path());
    }
}
