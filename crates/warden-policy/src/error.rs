//! Policy validation and registry error types.
//!
//! Validation failures are configuration errors: they are reported before any
//! run starts, organized by the part of the document that is wrong.

use std::fmt;
use thiserror::Error;

/// Error type for policy validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyError {
    /// The kind of validation error.
    pub kind: PolicyErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl PolicyError {
    /// Create a new policy error.
    pub fn new(kind: PolicyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    // =========================================================================
    // DOCUMENT ERRORS
    // =========================================================================

    pub fn missing_version() -> Self {
        Self::new(PolicyErrorKind::MissingVersion, "policy.version is required")
    }

    pub fn no_service_policies() -> Self {
        Self::new(
            PolicyErrorKind::NoServicePolicies,
            "policy.policies must contain at least one service policy",
        )
    }

    pub fn no_services_registered() -> Self {
        Self::new(
            PolicyErrorKind::NoServicesRegistered,
            "no services are registered - ensure service adapters are registered before validation",
        )
    }

    // =========================================================================
    // SERVICE POLICY ERRORS
    // =========================================================================

    /// `available` is the live catalog content, not a fixed list.
    pub fn unsupported_service(index: usize, service: &str, available: &[String]) -> Self {
        Self::new(
            PolicyErrorKind::UnsupportedService,
            format!(
                "policies[{}]: unsupported service '{}' (available services: {})",
                index,
                service,
                available.join(", ")
            ),
        )
    }

    pub fn empty_service_policy(index: usize, service: &str) -> Self {
        Self::new(
            PolicyErrorKind::EmptyServicePolicy,
            format!("policies[{}].{}: must contain at least one rule", index, service),
        )
    }

    // =========================================================================
    // RULE ERRORS
    // =========================================================================

    pub fn missing_rule_name(index: usize, service: &str, rule_index: usize) -> Self {
        Self::new(
            PolicyErrorKind::MissingRuleName,
            format!(
                "policies[{}].{}.rules[{}]: name is required",
                index, service, rule_index
            ),
        )
    }

    pub fn duplicate_rule_name(rule: &str) -> Self {
        Self::new(
            PolicyErrorKind::DuplicateRuleName,
            format!("duplicate rule name '{}'", rule),
        )
    }

    pub fn service_mismatch(rule: &str, service: &str, parent: &str) -> Self {
        Self::new(
            PolicyErrorKind::ServiceMismatch,
            format!(
                "rule '{}': service '{}' does not match parent service '{}'",
                rule, service, parent
            ),
        )
    }

    pub fn missing_resource(rule: &str) -> Self {
        Self::new(
            PolicyErrorKind::MissingResource,
            format!("rule '{}': resource is required", rule),
        )
    }

    /// `available` is the live catalog content for `service`.
    pub fn unsupported_resource(
        rule: &str,
        resource: &str,
        service: &str,
        available: &[String],
    ) -> Self {
        Self::new(
            PolicyErrorKind::UnsupportedResource,
            format!(
                "rule '{}': unsupported resource '{}' for service '{}' (available resources: {})",
                rule,
                resource,
                service,
                available.join(", ")
            ),
        )
    }

    pub fn missing_action(rule: &str) -> Self {
        Self::new(
            PolicyErrorKind::MissingAction,
            format!("rule '{}': action is required", rule),
        )
    }

    pub fn unsupported_action(rule: &str, action: &str) -> Self {
        Self::new(
            PolicyErrorKind::UnsupportedAction,
            format!(
                "rule '{}': unsupported action '{}' (supported: log, delete, tag)",
                rule, action
            ),
        )
    }

    pub fn missing_tag_name(rule: &str) -> Self {
        Self::new(
            PolicyErrorKind::MissingTagName,
            format!("rule '{}': tag_name is required when action is 'tag'", rule),
        )
    }

    pub fn invalid_age_threshold(rule: &str, err: &warden_core::AgeParseError) -> Self {
        Self::new(
            PolicyErrorKind::InvalidAgeThreshold,
            format!("rule '{}': {}", rule, err),
        )
    }

    // =========================================================================
    // CHECK CONDITION ERRORS
    // =========================================================================

    /// The check sets no field at all while a service validator is registered.
    pub fn empty_check(rule: &str) -> Self {
        Self::new(
            PolicyErrorKind::NoCheckSpecified,
            format!("rule '{}': check must specify at least one condition", rule),
        )
    }

    /// None of the resource type's allowed fields is set.
    pub fn no_check_specified(rule: &str, allowed: &[&str]) -> Self {
        Self::new(
            PolicyErrorKind::NoCheckSpecified,
            format!(
                "rule '{}': check must specify at least one of: {}",
                rule,
                allowed.join(", ")
            ),
        )
    }

    /// Fields are set that the resource type does not support.
    pub fn unsupported_check_fields(rule: &str, fields: &[&str]) -> Self {
        Self::new(
            PolicyErrorKind::UnsupportedCheckFields,
            format!(
                "rule '{}': check specifies unsupported fields: {}",
                rule,
                fields.join(", ")
            ),
        )
    }

    /// A service validator does not know the resource type.
    pub fn unsupported_validator_resource(rule: &str, resource: &str, service: &str) -> Self {
        Self::new(
            PolicyErrorKind::UnsupportedResource,
            format!(
                "rule '{}': unsupported resource type '{}' for {} service",
                rule, resource, service
            ),
        )
    }

    /// Free-form rejection from a service validator.
    pub fn invalid_check(rule: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            PolicyErrorKind::InvalidCheck,
            format!("rule '{}': {}", rule, reason),
        )
    }
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PolicyError {}

/// Categories of policy validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyErrorKind {
    // =========================================================================
    // Document errors
    // =========================================================================
    /// `version` is empty.
    MissingVersion,
    /// No service policies.
    NoServicePolicies,
    /// The resource catalog is empty.
    NoServicesRegistered,

    // =========================================================================
    // Service policy errors
    // =========================================================================
    /// Service is not in the resource catalog.
    UnsupportedService,
    /// Service policy has no rules.
    EmptyServicePolicy,

    // =========================================================================
    // Rule errors
    // =========================================================================
    MissingRuleName,
    /// Rule name used twice anywhere in the policy.
    DuplicateRuleName,
    /// Rule's explicit service differs from its parent.
    ServiceMismatch,
    MissingResource,
    /// Resource is not registered for the service.
    UnsupportedResource,
    MissingAction,
    UnsupportedAction,
    /// `tag` action without `tag_name`.
    MissingTagName,
    /// `age_gt` does not parse.
    InvalidAgeThreshold,

    // =========================================================================
    // Check condition errors
    // =========================================================================
    /// No allowed check field is set.
    NoCheckSpecified,
    /// A set field is outside the resource type's allow-list.
    UnsupportedCheckFields,
    /// Other validator-specific rejection.
    InvalidCheck,
}

/// Errors raised by registry mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{kind} '{name}' is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },

    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("validator for '{validator}' cannot be registered with service '{service}'")]
    ValidatorMismatch { service: String, validator: String },
}
