//! Shell completion generation for `kmdo --completions <SHELL>`.

use clap::{CommandFactory, ValueEnum};
use clap_complete::{Shell, generate};
use std::io::{self, Write};

/// Shell options for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShellArg {
    /// Bash shell completions
    Bash,
    /// Zsh shell completions
    Zsh,
    /// Fish shell completions
    Fish,
    /// PowerShell completions
    PowerShell,
}

impl From<ShellArg> for Shell {
    fn from(arg: ShellArg) -> Self {
        match arg {
            ShellArg::Bash => Shell::Bash,
            ShellArg::Zsh => Shell::Zsh,
            ShellArg::Fish => Shell::Fish,
            ShellArg::PowerShell => Shell::PowerShell,
        }
    }
}

/// Writes the completion script for `shell` to `out`.
pub fn write_completions(shell: ShellArg, out: &mut dyn Write) {
    let mut cmd = crate::Cli::command();
    generate(Shell::from(shell), &mut cmd, "kmdo", out);
}

pub fn generate_completions(shell: ShellArg) {
    write_completions(shell, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: ShellArg) -> String {
        let mut buf = Vec::new();
        write_completions(shell, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_bash_completions_mention_flags() {
        let out = script(ShellArg::Bash);
        assert!(out.contains("kmdo"));
        assert!(out.contains("--exclude"));
        assert!(out.contains("--timeout"));
    }

    #[test]
    fn test_every_shell_generates() {
        for shell in [ShellArg::Bash, ShellArg::Zsh, ShellArg::Fish, ShellArg::PowerShell] {
            assert!(!script(shell).is_empty(), "{shell:?}");
        }
    }
}
