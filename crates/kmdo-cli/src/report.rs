//! Report rendering for stdout.
//!
//! The YAML layout is the one kmdo has always printed: an `args:` block, a
//! `results:` sequence with one item per command, and a closing `nerrs:`
//! count. Each record is flushed as soon as it arrives so long runs can be
//! followed live.

use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use kmdo_core::{KmdoError, KmdoResult, RecordSink, ReportFormat};
use kmdo_proto::{CommandRecord, RunSummary};

/// Run parameters echoed at the top of a YAML report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportArgs {
    pub path: PathBuf,
    pub recursive: bool,
}

#[derive(Serialize)]
struct Header<'a> {
    args: &'a ReportArgs,
}

#[derive(Serialize)]
struct Footer {
    nerrs: usize,
}

/// Streams a run report to `out`.
pub struct ReportWriter<W: Write> {
    out: W,
    format: ReportFormat,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W, format: ReportFormat) -> Self {
        Self { out, format }
    }

    pub fn begin(&mut self, args: &ReportArgs) -> KmdoResult<()> {
        if self.format == ReportFormat::Yaml {
            let header = serde_yaml::to_string(&Header { args }).map_err(report_error)?;
            self.out.write_all(header.as_bytes()).map_err(KmdoError::Report)?;
            self.out.write_all(b"results:\n").map_err(KmdoError::Report)?;
        }
        self.flush()
    }

    pub fn finish(&mut self, summary: &RunSummary) -> KmdoResult<()> {
        match self.format {
            ReportFormat::Yaml => {
                let footer = serde_yaml::to_string(&Footer {
                    nerrs: summary.failures,
                })
                .map_err(report_error)?;
                self.out.write_all(footer.as_bytes()).map_err(KmdoError::Report)?;
            }
            ReportFormat::Jsonl => self.write_json_line(summary)?,
        }
        self.flush()
    }

    /// Notes a fatal error in the report itself, so a truncated report is
    /// recognisable as such.
    pub fn fatal(&mut self, message: &str) -> KmdoResult<()> {
        match self.format {
            ReportFormat::Yaml => {
                // Keep the document parseable: one comment line per message line.
                for line in message.lines() {
                    writeln!(self.out, "# err({line})").map_err(KmdoError::Report)?;
                }
            }
            ReportFormat::Jsonl => {
                self.write_json_line(&serde_json::json!({ "error": message }))?;
            }
        }
        self.flush()
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_json_line<T: Serialize>(&mut self, value: &T) -> KmdoResult<()> {
        serde_json::to_writer(&mut self.out, value).map_err(report_error)?;
        self.out.write_all(b"\n").map_err(KmdoError::Report)
    }

    fn flush(&mut self) -> KmdoResult<()> {
        self.out.flush().map_err(KmdoError::Report)
    }
}

impl<W: Write> RecordSink for ReportWriter<W> {
    fn record(&mut self, record: &CommandRecord) -> KmdoResult<()> {
        match self.format {
            ReportFormat::Yaml => {
                // A one-item sequence renders as "- key: ..." with the rest indented.
                let item =
                    serde_yaml::to_string(std::slice::from_ref(record)).map_err(report_error)?;
                self.out.write_all(item.as_bytes()).map_err(KmdoError::Report)?;
            }
            ReportFormat::Jsonl => self.write_json_line(record)?,
        }
        self.flush()
    }
}

fn report_error(err: impl std::error::Error + Send + Sync + 'static) -> KmdoError {
    KmdoError::Report(io::Error::other(err))
}
