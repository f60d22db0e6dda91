//! Draining a run into totals and findings.

use std::fmt;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use warden_core::AuditResult;

use crate::writer::ResultWriter;

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub scanned: u64,
    pub violations: u64,
    /// Audit and remediation errors together.
    pub errors: u64,
    /// Results handed to the writer successfully.
    pub written: u64,
    pub remediation_attempted: u64,
    pub remediated: u64,
    pub remediation_skipped: u64,
}

impl Summary {
    /// Count one result.
    pub fn record(&mut self, result: &AuditResult) {
        self.scanned += 1;
        if result.error.is_some() {
            self.errors += 1;
        }
        if result.remediation_error().is_some() {
            self.errors += 1;
        }
        if !result.compliant {
            self.violations += 1;
        }
        if result.remediation_attempted() {
            self.remediation_attempted += 1;
        }
        if result.remediated() {
            self.remediated += 1;
        }
        if result.remediation_skipped() {
            self.remediation_skipped += 1;
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "---- Summary ----")?;
        writeln!(f, "Scanned: {}", self.scanned)?;
        writeln!(f, "Violations: {}", self.violations)?;
        writeln!(f, "Errors: {}", self.errors)?;
        writeln!(f, "Remediation attempted: {}", self.remediation_attempted)?;
        writeln!(f, "Remediated: {}", self.remediated)?;
        write!(f, "Remediation skipped: {}", self.remediation_skipped)
    }
}

/// Whether a result belongs in the findings output.
pub fn is_reportable(result: &AuditResult) -> bool {
    !result.compliant || result.error.is_some() || result.remediation_error().is_some()
}

/// Drain `results` into a [`Summary`], writing reportable results to `writer`.
///
/// Write failures are logged and leave `written` untouched; they never stop
/// consumption. Pass `&mut stream` to keep the run handle for `join`.
pub async fn consume_results<S>(results: S, mut writer: Option<&mut dyn ResultWriter>) -> Summary
where
    S: Stream<Item = AuditResult>,
{
    let mut results = std::pin::pin!(results);
    let mut summary = Summary::default();

    while let Some(result) = results.next().await {
        summary.record(&result);

        if let Some(writer) = writer.as_deref_mut() {
            if is_reportable(&result) {
                match writer.write_result(&result) {
                    Ok(()) => summary.written += 1,
                    Err(e) => warn!(
                        rule = %result.rule_name,
                        resource_id = %result.resource_id,
                        error = %e,
                        "failed to write finding"
                    ),
                }
            }
        }
    }

    if let Some(writer) = writer {
        if let Err(e) = writer.finish() {
            warn!(error = %e, "failed to flush findings");
        }
    }

    info!(
        scanned = summary.scanned,
        violations = summary.violations,
        errors = summary.errors,
        written = summary.written,
        "results consumed"
    );
    summary
}
