//! Policy validation.
//!
//! [`PolicyValidator`] is the entry point. Checks run in a fixed order and stop at
//! the first failure:
//!
//! 1. **Document** - version present, at least one service policy, catalog populated
//! 2. **Service policies** - service known to the catalog, at least one rule
//! 3. **Rules** - name present and globally unique, service consistent with its
//!    parent, resource registered, action supported, tag name for `tag`, age
//!    threshold parseable
//! 4. **Check conditions** - deferred to the service's [`ResourceValidator`], if any
//!
//! [`ResourceValidator`]: crate::registry::ResourceValidator

use std::collections::HashSet;

use tracing::debug;
use warden_core::{Action, Policy, Rule};

use crate::catalog::ResourceCatalog;
use crate::error::PolicyError;
use crate::registry::ValidatorRegistry;

/// Validates a [`Policy`] against the registered catalog and validators.
pub struct PolicyValidator<'a> {
    catalog: &'a ResourceCatalog,
    validators: Option<&'a ValidatorRegistry>,
}

impl<'a> PolicyValidator<'a> {
    /// Create a validator that only consults the resource catalog.
    pub fn new(catalog: &'a ResourceCatalog) -> Self {
        Self {
            catalog,
            validators: None,
        }
    }

    /// Also run service-specific check validation.
    pub fn with_validators(mut self, validators: &'a ValidatorRegistry) -> Self {
        self.validators = Some(validators);
        self
    }

    /// Validate `policy`.
    ///
    /// Returns `Ok(())` if every check passes, or the first [`PolicyError`].
    pub fn validate(&self, policy: &Policy) -> Result<(), PolicyError> {
        if policy.version.trim().is_empty() {
            return Err(PolicyError::missing_version());
        }
        if policy.policies.is_empty() {
            return Err(PolicyError::no_service_policies());
        }
        if self.catalog.is_empty() {
            return Err(PolicyError::no_services_registered());
        }

        let mut seen_names = HashSet::new();

        for (index, service_policy) in policy.policies.iter().enumerate() {
            let service = service_policy.service.trim().to_ascii_lowercase();
            if !self.catalog.is_service_supported(&service) {
                return Err(PolicyError::unsupported_service(
                    index,
                    &service_policy.service,
                    &self.catalog.services(),
                ));
            }
            if service_policy.rules.is_empty() {
                return Err(PolicyError::empty_service_policy(index, &service));
            }

            for (rule_index, rule) in service_policy.rules.iter().enumerate() {
                if rule.name.trim().is_empty() {
                    return Err(PolicyError::missing_rule_name(index, &service, rule_index));
                }
                if !seen_names.insert(rule.name.as_str()) {
                    return Err(PolicyError::duplicate_rule_name(&rule.name));
                }
                self.validate_rule(rule, &service)?;
            }
        }

        debug!(
            services = policy.policies.len(),
            rules = policy.rule_count(),
            "policy validated"
        );
        Ok(())
    }

    fn validate_rule(&self, rule: &Rule, service: &str) -> Result<(), PolicyError> {
        if !rule.service.is_empty() && !rule.service.eq_ignore_ascii_case(service) {
            return Err(PolicyError::service_mismatch(&rule.name, &rule.service, service));
        }

        if rule.resource.trim().is_empty() {
            return Err(PolicyError::missing_resource(&rule.name));
        }
        if !self.catalog.is_resource_supported(service, &rule.resource) {
            return Err(PolicyError::unsupported_resource(
                &rule.name,
                &rule.resource,
                service,
                &self.catalog.service_resources(service),
            ));
        }

        if rule.action.trim().is_empty() {
            return Err(PolicyError::missing_action(&rule.name));
        }
        let action = rule
            .remediation_action()
            .ok_or_else(|| PolicyError::unsupported_action(&rule.name, &rule.action))?;
        if action == Action::Tag && rule.tag_name.trim().is_empty() {
            return Err(PolicyError::missing_tag_name(&rule.name));
        }

        rule.check
            .age_threshold()
            .map_err(|e| PolicyError::invalid_age_threshold(&rule.name, &e))?;

        if let Some(validator) = self.validators.and_then(|v| v.get(service)) {
            if rule.check.is_empty() {
                return Err(PolicyError::empty_check(&rule.name));
            }
            validator.validate_resource(&rule.check, &rule.resource, &rule.name)?;
        }

        Ok(())
    }
}
