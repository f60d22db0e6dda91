//! Findings output backends.

use std::io::{self, Write};

use warden_core::AuditResult;

use crate::error::ReportError;
use crate::finding::Finding;

/// Destination for findings.
pub trait ResultWriter: Send {
    /// Write one result.
    fn write_result(&mut self, result: &AuditResult) -> Result<(), ReportError>;

    /// Flush buffered output. Called once after the last result.
    fn finish(&mut self) -> Result<(), ReportError> {
        Ok(())
    }
}

/// Create a writer for `format` over `sink`.
///
/// `json`, `jsonl` and the empty string all select JSON lines.
pub fn new_writer(
    format: &str,
    sink: Box<dyn Write + Send>,
) -> Result<Box<dyn ResultWriter>, ReportError> {
    match format.trim().to_ascii_lowercase().as_str() {
        "" | "json" | "jsonl" => Ok(Box::new(JsonLinesWriter::new(sink))),
        other => Err(ReportError::UnsupportedFormat(other.to_string())),
    }
}

/// One JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ResultWriter for JsonLinesWriter<W> {
    fn write_result(&mut self, result: &AuditResult) -> Result<(), ReportError> {
        serde_json::to_writer(&mut self.out, &Finding::from(result))?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Human-readable lines, stdout by default.
pub struct ConsoleWriter<W: Write = io::Stdout> {
    out: W,
}

impl ConsoleWriter {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleWriter<W> {
    pub fn with_output(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ResultWriter for ConsoleWriter<W> {
    fn write_result(&mut self, result: &AuditResult) -> Result<(), ReportError> {
        let finding = Finding::from(result);
        let label = if !finding.error.is_empty() {
            "ERROR"
        } else if !finding.compliant {
            "VIOLATION"
        } else {
            "OK"
        };

        write!(
            self.out,
            "[{}] {} {}/{} {}",
            label, finding.rule_id, finding.service, finding.resource_type, finding.resource_id
        )?;
        if !finding.resource_name.is_empty() {
            write!(self.out, " ({})", finding.resource_name)?;
        }
        if !finding.observation.is_empty() {
            write!(self.out, ": {}", finding.observation)?;
        }
        if !finding.error.is_empty() {
            write!(self.out, " {} error: {}", finding.error_kind, finding.error)?;
        }
        if finding.remediated {
            write!(self.out, " [remediated: {}]", finding.action)?;
        } else if !finding.remediation_error.is_empty() {
            write!(self.out, " [remediation failed: {}]", finding.remediation_error)?;
        } else if finding.remediation_skipped {
            write!(self.out, " [skipped: {}]", finding.remediation_skip_reason)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), ReportError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWriter;

impl ResultWriter for NullWriter {
    fn write_result(&mut self, _result: &AuditResult) -> Result<(), ReportError> {
        Ok(())
    }
}
