//! kmdo - run the commands in `.cmd` files and store their output next to
//! them in `.out` (or `.err`) files.

mod completions;
mod report;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use kmdo_core::config::{DEFAULT_CONFIG_FILE, parse_timeout};
use kmdo_core::{
    CancellationToken, DEFAULT_SHELL, DiscoveryOptions, KmdoConfig, ReportFormat, RunCoordinator,
    RunOptions, ShellExecutor, resolve_path,
};
use kmdo_proto::INTERRUPTED_EXIT_CODE;

use crate::completions::ShellArg;
use crate::report::{ReportArgs, ReportWriter};

/// Verbosity level for diagnostics on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Progress per command file (default)
    #[default]
    Normal,
    /// Everything, including each spawned command
    Verbose,
}

impl Verbosity {
    /// Resolves verbosity from CLI args and env vars.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags: `--verbose`/`-v` or `--quiet`/`-q`
    /// 2. Environment variables: `KMDO_VERBOSE=1` or `KMDO_QUIET=1`
    /// 3. Default: Normal
    fn resolve(cli_verbose: bool, cli_quiet: bool) -> Self {
        let env_quiet = std::env::var("KMDO_QUIET").is_ok();
        let env_verbose = std::env::var("KMDO_VERBOSE").is_ok();
        Self::resolve_with_env(cli_verbose, cli_quiet, env_quiet, env_verbose)
    }

    #[allow(clippy::fn_params_excessive_bools)]
    fn resolve_with_env(
        cli_verbose: bool,
        cli_quiet: bool,
        env_quiet: bool,
        env_verbose: bool,
    ) -> Self {
        if cli_quiet {
            return Verbosity::Quiet;
        }
        if cli_verbose {
            return Verbosity::Verbose;
        }

        if env_quiet {
            return Verbosity::Quiet;
        }
        if env_verbose {
            return Verbosity::Verbose;
        }

        Verbosity::Normal
    }

    fn filter(self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
        }
    }
}

/// Report format on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// YAML document with one item per command
    Yaml,
    /// One JSON object per command, then a summary line
    Jsonl,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => ReportFormat::Yaml,
            FormatArg::Jsonl => ReportFormat::Jsonl,
        }
    }
}

const EXIT_STATUS_HELP: &str = "\
Exit status:
  0      every command succeeded (or was allowed to fail)
  1-255  number of failed commands, capped at 255
  130    interrupted; the report still lists every command that finished";

/// Run commands from .cmd files, storing output in .out files
#[derive(Parser, Debug)]
#[command(name = "kmdo", version, about, after_help = EXIT_STATUS_HELP)]
struct Cli {
    /// Directory containing .cmd files; `~` and `$VARS` are expanded
    #[arg(required_unless_present = "completions")]
    path: Option<String>,

    /// Only run command files directly inside PATH (historical name)
    #[arg(short, long)]
    recursive: bool,

    /// Shell used to interpret each command [default: /bin/sh]
    #[arg(short, long, env = "KMDO_SHELL")]
    shell: Option<PathBuf>,

    /// Skip command files whose name contains this text
    #[arg(short = 'x', long)]
    exclude: Option<String>,

    /// Per-command timeout in seconds; fractions allowed
    #[arg(short, long, env = "KMDO_TIMEOUT", value_parser = parse_timeout_arg)]
    timeout: Option<Duration>,

    /// Report commands without running them or writing output files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Configuration file [default: kmdo.yml, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose diagnostics on stderr
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long)]
    quiet: bool,

    /// Print shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<ShellArg>,
}

fn parse_timeout_arg(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number of seconds"))?;
    parse_timeout(secs)
}

/// Effective settings after layering CLI, environment and config file.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    root: PathBuf,
    restrict_depth: bool,
    exclude: Option<String>,
    shell: PathBuf,
    timeout: Option<Duration>,
    dry_run: bool,
    format: ReportFormat,
}

impl Settings {
    /// CLI values (clap already folds in `KMDO_SHELL`/`KMDO_TIMEOUT`) win
    /// over the config file, which wins over defaults.
    fn resolve(cli: &Cli, config: &KmdoConfig) -> Result<Self> {
        let path = cli.path.as_deref().context("no PATH given")?;
        let root = resolve_path(path).with_context(|| format!("cannot use PATH '{path}'"))?;

        let timeout = match cli.timeout {
            Some(timeout) => Some(timeout),
            None => config.timeout().map_err(anyhow::Error::msg)?,
        };

        Ok(Self {
            root,
            restrict_depth: cli.recursive || config.recursive,
            exclude: cli.exclude.clone().or_else(|| config.exclude.clone()),
            shell: cli
                .shell
                .clone()
                .or_else(|| config.shell.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL)),
            timeout,
            dry_run: cli.dry_run || config.dry_run,
            format: cli.format.map_or(config.format, ReportFormat::from),
        })
    }
}

/// Loads the explicit config file, or `kmdo.yml` from the working directory
/// when it exists.
fn load_config(explicit: Option<&Path>) -> Result<KmdoConfig> {
    if let Some(path) = explicit {
        return KmdoConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }
    let default = Path::new(DEFAULT_CONFIG_FILE);
    if default.is_file() {
        debug!(path = %default.display(), "using config file");
        return KmdoConfig::from_file(default)
            .with_context(|| format!("Failed to load config from {DEFAULT_CONFIG_FILE}"));
    }
    Ok(KmdoConfig::default())
}

fn init_tracing(verbosity: Verbosity) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter()));
    // stdout carries the report, so diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// First Ctrl-C stops the run after the current command; a second one exits.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received; stopping after the current command");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("second interrupt; exiting now");
            std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
        }
    });
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, &config)?;
    debug!(?settings, "resolved settings");

    let runner = ShellExecutor::new()
        .with_shell(&settings.shell)
        .with_timeout(settings.timeout);
    let coordinator = RunCoordinator::new(
        runner,
        RunOptions {
            discovery: DiscoveryOptions {
                restrict_depth: settings.restrict_depth,
                exclude: settings.exclude.clone(),
            },
            dry_run: settings.dry_run,
        },
    );

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let mut report = ReportWriter::new(io::stdout(), settings.format);
    report.begin(&ReportArgs {
        path: settings.root.clone(),
        recursive: settings.restrict_depth,
    })?;

    let summary = match coordinator.run(&settings.root, &mut report, &cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            if let Err(report_err) = report.fatal(&e.to_string()) {
                debug!("could not note error in report: {}", report_err);
            }
            return Err(e).context("run aborted");
        }
    };
    report.finish(&summary)?;

    if summary.cancelled {
        warn!(
            failures = summary.failures,
            "run interrupted; exiting with status {}",
            INTERRUPTED_EXIT_CODE
        );
    } else if summary.failures > 0 {
        info!(failures = summary.failures, "run finished with failures");
    }
    Ok(summary.exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        completions::generate_completions(shell);
        return ExitCode::SUCCESS;
    }

    init_tracing(Verbosity::resolve(cli.verbose, cli.quiet));

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
