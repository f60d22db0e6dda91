//! Building blocks for auditors.
//!
//! Most resource types share the same first steps: name exemptions, a status
//! match and an age threshold. Auditors wrap their payload in a
//! [`ResourceView`] and compose these helpers before adding type-specific logic.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use warden_core::{AuditResult, Job, MetadataMatch, Rule};

/// Uniform access to the fields every resource type carries.
pub trait ResourceView {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn project_id(&self) -> &str {
        ""
    }

    fn status(&self) -> &str {
        ""
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Metadata value for `key`, if the resource carries metadata.
    fn metadata(&self, _key: &str) -> Option<&str> {
        None
    }
}

/// Views a JSON payload with conventional field names: `id`, `name`,
/// `project_id` (or `tenant_id`), `status`, `created_at`, `updated_at`
/// (RFC 3339) and a `metadata` object.
impl ResourceView for Value {
    fn id(&self) -> &str {
        str_field(self, "id")
    }

    fn name(&self) -> &str {
        str_field(self, "name")
    }

    fn project_id(&self) -> &str {
        match str_field(self, "project_id") {
            "" => str_field(self, "tenant_id"),
            project => project,
        }
    }

    fn status(&self) -> &str {
        str_field(self, "status")
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        time_field(self, "created_at")
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        time_field(self, "updated_at")
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.get("metadata")?.get(key)?.as_str()
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn time_field(value: &Value, key: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.get(key)?.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A compliant result pre-filled from the job, the rule and the resource view.
pub fn base_result(job: &Job, rule: &Rule, view: &dyn ResourceView) -> AuditResult {
    let mut result = AuditResult::for_job(job, rule);
    result.resource_name = view.name().to_string();
    result.status = view.status().to_string();
    result.updated_at = view.updated_at().or_else(|| view.created_at());
    if result.project_id.is_none() && !view.project_id().is_empty() {
        result.project_id = Some(view.project_id().to_string());
    }
    result
}

/// Whether `name` matches any exemption pattern, exactly or as a glob with
/// `*` and `?`.
pub fn exempt_by_name(name: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| pattern == name || glob_matches(pattern, name))
}

fn glob_matches(pattern: &str, name: &str) -> bool {
    if !pattern.contains(['*', '?']) {
        return false;
    }
    compiled_glob(pattern).is_some_and(|re| re.is_match(name))
}

/// Compiled exemption globs, one per distinct pattern for the process lifetime.
fn glob_cache() -> &'static RwLock<HashMap<String, Option<Regex>>> {
    static GLOBS: OnceLock<RwLock<HashMap<String, Option<Regex>>>> = OnceLock::new();
    GLOBS.get_or_init(Default::default)
}

fn compiled_glob(pattern: &str) -> Option<Regex> {
    let cache = glob_cache();
    if let Some(re) = cache
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(pattern)
    {
        return re.clone();
    }

    let translated = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    let re = Regex::new(&format!("^{}$", translated)).ok();
    cache
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .entry(pattern.to_string())
        .or_insert(re)
        .clone()
}

/// Whether the resource carries the exempting metadata entry. An empty
/// expected value matches any value for the key.
pub fn exempt_by_metadata(view: &dyn ResourceView, exempt: Option<&MetadataMatch>) -> bool {
    let Some(exempt) = exempt else {
        return false;
    };
    match view.metadata(&exempt.key) {
        Some(value) => exempt.value.is_empty() || value == exempt.value,
        None => false,
    }
}

/// Flag the result when the resource status equals the rule's `status`.
pub fn check_status(view: &dyn ResourceView, rule: &Rule, result: &mut AuditResult) {
    let expected = &rule.check.status;
    if expected.is_empty() {
        return;
    }
    if view.status().eq_ignore_ascii_case(expected) {
        result.flag(format!("status is {}", view.status()));
    }
}

/// Flag the result when the resource is older than the rule's `age_gt`.
///
/// Age is measured from `updated_at`, falling back to `created_at`; a resource
/// with neither timestamp is never flagged.
pub fn check_age(
    view: &dyn ResourceView,
    rule: &Rule,
    result: &mut AuditResult,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if rule.check.age_gt.is_empty() {
        return Ok(());
    }
    let threshold = rule.check.age_threshold()?;

    let Some(timestamp) = view.updated_at().or_else(|| view.created_at()) else {
        return Ok(());
    };
    let age = now.signed_duration_since(timestamp);
    if age.to_std().is_ok_and(|age| age > threshold) {
        result.flag(format!(
            "resource is older than {} (last updated: {})",
            rule.check.age_gt,
            timestamp.to_rfc3339()
        ));
    }
    Ok(())
}

/// Run exempt_names, exempt_metadata, status and age_gt in that order.
///
/// Returns `true` when the resource is exempt; the result is then compliant
/// and the auditor should stop.
pub fn run_common_checks(
    view: &dyn ResourceView,
    rule: &Rule,
    result: &mut AuditResult,
) -> anyhow::Result<bool> {
    if exempt_by_name(view.name(), &rule.check.exempt_names) {
        result.compliant = true;
        result.observation = "exempt by name".to_string();
        return Ok(true);
    }
    if exempt_by_metadata(view, rule.check.exempt_metadata.as_ref()) {
        result.compliant = true;
        result.observation = "exempt by metadata".to_string();
        return Ok(true);
    }

    check_status(view, rule, result);
    check_age(view, rule, result, Utc::now())?;
    Ok(false)
}
