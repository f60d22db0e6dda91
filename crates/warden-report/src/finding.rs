//! The serialized form of a result.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use warden_core::{AuditResult, RemediationOutcome};

/// One line of findings output.
///
/// Flat on purpose: every field is a scalar so the record maps directly onto
/// JSON lines or a log line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub resource_id: String,
    pub resource_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    /// RFC 3339, UTC.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub updated_at: String,
    pub compliant: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub observation: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guide_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_kind: String,

    #[serde(default, skip_serializing_if = "is_false")]
    pub remediation_attempted: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub remediated: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remediation_error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remediation_error_kind: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub remediation_skipped: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remediation_skip_reason: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl From<&AuditResult> for Finding {
    fn from(result: &AuditResult) -> Self {
        let mut finding = Self {
            rule_id: result.rule_name.clone(),
            resource_id: result.resource_id.clone(),
            resource_name: result.resource_name.clone(),
            resource_type: result.resource_type.clone(),
            service: result.service.clone(),
            project_id: result.project_id.clone().unwrap_or_default(),
            status: result.status.clone(),
            updated_at: result
                .updated_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            compliant: result.compliant,
            observation: result.observation.clone(),
            action: result.action.clone(),
            severity: result.severity.clone(),
            category: result.category.clone(),
            guide_ref: result.guide_ref.clone(),
            ..Default::default()
        };

        if let Some(error) = &result.error {
            finding.error = error.message.clone();
            finding.error_kind = error.kind.to_string();
        }

        match &result.remediation {
            RemediationOutcome::NotRequired => {}
            RemediationOutcome::Skipped { reason } => {
                finding.remediation_skipped = true;
                finding.remediation_skip_reason = reason.to_string();
            }
            RemediationOutcome::Succeeded => {
                finding.remediation_attempted = true;
                finding.remediated = true;
            }
            RemediationOutcome::Failed { error } => {
                finding.remediation_attempted = true;
                finding.remediation_error = error.message.clone();
                finding.remediation_error_kind = error.kind.to_string();
            }
        }
        finding
    }
}
