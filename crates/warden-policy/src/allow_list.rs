//! Table-driven resource validation.
//!
//! Each resource type declares the [`CheckField`]s it understands. A rule passes
//! when at least one allowed field is set and no field outside the list is.

use std::collections::HashMap;

use warden_core::{CheckConditions, CheckField};

use crate::error::PolicyError;
use crate::registry::ResourceValidator;

/// A [`ResourceValidator`] backed by a per-resource-type allow-list.
///
/// ```rust
/// use warden_core::{CheckConditions, CheckField};
/// use warden_policy::{AllowListValidator, ResourceValidator};
///
/// let validator = AllowListValidator::new("neutron")
///     .allow("floating_ip", [CheckField::Unassociated, CheckField::ExemptNames]);
///
/// let check = CheckConditions { unassociated: true, ..Default::default() };
/// assert!(validator.validate_resource(&check, "floating_ip", "orphan-ips").is_ok());
/// assert!(validator.validate_resource(&check, "port", "orphan-ips").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct AllowListValidator {
    service: String,
    resources: HashMap<String, Vec<CheckField>>,
}

impl AllowListValidator {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            resources: HashMap::new(),
        }
    }

    /// Declare the fields allowed for `resource_type`, replacing any earlier list.
    pub fn allow(
        mut self,
        resource_type: impl Into<String>,
        fields: impl IntoIterator<Item = CheckField>,
    ) -> Self {
        let mut fields: Vec<CheckField> = fields.into_iter().collect();
        fields.sort();
        fields.dedup();
        self.resources
            .insert(resource_type.into().to_ascii_lowercase(), fields);
        self
    }

    /// Allowed fields for `resource_type`, if the type is known.
    pub fn allowed_fields(&self, resource_type: &str) -> Option<&[CheckField]> {
        self.resources
            .get(&resource_type.to_ascii_lowercase())
            .map(Vec::as_slice)
    }
}

impl ResourceValidator for AllowListValidator {
    fn service_name(&self) -> &str {
        &self.service
    }

    fn validate_resource(
        &self,
        check: &CheckConditions,
        resource_type: &str,
        rule_name: &str,
    ) -> Result<(), PolicyError> {
        let allowed = self.allowed_fields(resource_type).ok_or_else(|| {
            PolicyError::unsupported_validator_resource(rule_name, resource_type, &self.service)
        })?;
        validate_allowed_checks(check, allowed, rule_name)
    }
}

/// Check `check` against `allowed`.
///
/// An empty allow-list accepts anything. Otherwise at least one allowed field must
/// be set and every set field must be allowed.
pub fn validate_allowed_checks(
    check: &CheckConditions,
    allowed: &[CheckField],
    rule_name: &str,
) -> Result<(), PolicyError> {
    if allowed.is_empty() {
        return Ok(());
    }

    let set = check.set_fields();
    if !set.iter().any(|field| allowed.contains(field)) {
        let names: Vec<&str> = allowed.iter().map(CheckField::as_str).collect();
        return Err(PolicyError::no_check_specified(rule_name, &names));
    }

    let disallowed: Vec<&str> = set
        .iter()
        .filter(|field| !allowed.contains(field))
        .map(CheckField::as_str)
        .collect();
    if !disallowed.is_empty() {
        return Err(PolicyError::unsupported_check_fields(rule_name, &disallowed));
    }

    Ok(())
}
