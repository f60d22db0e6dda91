//! Evaluation outcomes.
//!
//! An [`AuditResult`] describes one (job, rule) evaluation. Errors are tagged by
//! phase so a consumer can tell "could not even inspect" ([`ErrorKind::Audit`])
//! from "inspected, found a violation, remediation then failed"
//! ([`ErrorKind::Remediation`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::Job;
use crate::policy::Rule;

/// Phase an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The auditor's check failed.
    Audit,
    /// The auditor's fix failed.
    Remediation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audit => write!(f, "audit"),
            Self::Remediation => write!(f, "remediation"),
        }
    }
}

/// An error captured on a result, tagged with its phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PhaseError {
    pub fn audit(err: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Audit,
            // `{:#}` keeps the context chain of anyhow errors on one line.
            message: format!("{:#}", err),
        }
    }

    pub fn remediation(err: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Remediation,
            message: format!("{:#}", err),
        }
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Why a remediation was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The run is not in apply mode.
    DryRun,
    /// The action is missing from a non-empty allow-list.
    ActionNotAllowed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry-run",
            Self::ActionNotAllowed => "action-not-allowed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to remediation for a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RemediationOutcome {
    /// Compliant, errored, or a `log` rule: nothing to remediate.
    #[default]
    NotRequired,
    /// Remediation was due but not executed.
    Skipped { reason: SkipReason },
    /// Fix was called and succeeded.
    Succeeded,
    /// Fix was called and failed.
    Failed { error: PhaseError },
}

/// The outcome of evaluating one job against one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub rule_name: String,
    pub service: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub resource_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    pub compliant: bool,
    /// Human-readable observation.
    #[serde(default)]
    pub observation: String,

    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Action named by the rule.
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub guide_ref: String,

    /// Audit-phase error, if the check could not be evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PhaseError>,

    #[serde(default)]
    pub remediation: RemediationOutcome,
}

impl AuditResult {
    /// A compliant result carrying the identity of `job` and `rule`.
    ///
    /// Auditors start from this and flip `compliant` when a predicate matches.
    pub fn for_job(job: &Job, rule: &Rule) -> Self {
        Self {
            rule_name: rule.name.clone(),
            service: job.service.clone(),
            resource_type: job.resource_type.clone(),
            resource_id: job.resource_id.clone(),
            resource_name: String::new(),
            project_id: job.project_id.clone(),
            compliant: true,
            observation: String::new(),
            status: String::new(),
            updated_at: None,
            action: rule.action.clone(),
            severity: rule.severity.clone(),
            category: rule.category.clone(),
            guide_ref: rule.guide_ref.clone(),
            error: None,
            remediation: RemediationOutcome::NotRequired,
        }
    }

    /// A non-compliant result for a check that failed with `err`.
    pub fn audit_failure(job: &Job, rule: &Rule, err: impl fmt::Display) -> Self {
        let mut result = Self::for_job(job, rule);
        result.compliant = false;
        result.error = Some(PhaseError::audit(err));
        result
    }

    /// Fill identity and classification fields an auditor left empty.
    pub fn fill_from(&mut self, job: &Job, rule: &Rule) {
        fill_if_empty(&mut self.rule_name, &rule.name);
        fill_if_empty(&mut self.service, &job.service);
        fill_if_empty(&mut self.resource_type, &job.resource_type);
        fill_if_empty(&mut self.resource_id, &job.resource_id);
        fill_if_empty(&mut self.action, &rule.action);
        fill_if_empty(&mut self.severity, &rule.severity);
        fill_if_empty(&mut self.category, &rule.category);
        fill_if_empty(&mut self.guide_ref, &rule.guide_ref);
        if self.project_id.is_none() {
            self.project_id = job.project_id.clone();
        }
    }

    /// Mark the result non-compliant and append `observation`.
    pub fn flag(&mut self, observation: impl AsRef<str>) {
        self.compliant = false;
        if !self.observation.is_empty() {
            self.observation.push_str("; ");
        }
        self.observation.push_str(observation.as_ref());
    }

    /// Non-compliant and evaluated without error.
    pub fn is_violation(&self) -> bool {
        !self.compliant && self.error.is_none()
    }

    pub fn remediation_attempted(&self) -> bool {
        matches!(
            self.remediation,
            RemediationOutcome::Succeeded | RemediationOutcome::Failed { .. }
        )
    }

    pub fn remediated(&self) -> bool {
        matches!(self.remediation, RemediationOutcome::Succeeded)
    }

    pub fn remediation_skipped(&self) -> bool {
        matches!(self.remediation, RemediationOutcome::Skipped { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match &self.remediation {
            RemediationOutcome::Skipped { reason } => Some(*reason),
            _ => None,
        }
    }

    pub fn remediation_error(&self) -> Option<&PhaseError> {
        match &self.remediation {
            RemediationOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }
}

fn fill_if_empty(field: &mut String, value: &str) {
    if field.is_empty() {
        *field = value.to_string();
    }
}
