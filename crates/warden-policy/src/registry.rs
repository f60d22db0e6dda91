//! Per-service resource validators.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use warden_core::CheckConditions;

use crate::error::{PolicyError, RegistryError};

/// Service-specific semantic validation of a rule's check conditions.
///
/// Implementations decide which [`CheckConditions`] fields make sense for each of
/// the service's resource types.
pub trait ResourceValidator: Send + Sync {
    /// Name of the service this validator covers.
    fn service_name(&self) -> &str;

    /// Validate `check` for `resource_type`; `rule_name` is used in messages.
    fn validate_resource(
        &self,
        check: &CheckConditions,
        resource_type: &str,
        rule_name: &str,
    ) -> Result<(), PolicyError>;
}

/// Service name -> validator.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: RwLock<HashMap<String, Arc<dyn ResourceValidator>>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator under its service name. A second validator for the
    /// same service is rejected.
    pub fn register(&self, validator: Arc<dyn ResourceValidator>) -> Result<(), RegistryError> {
        let name = validator.service_name().trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(RegistryError::EmptyName { kind: "validator" });
        }

        let mut validators = self
            .validators
            .write()
            .unwrap_or_else(|e| e.into_inner());
        if validators.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered {
                kind: "validator",
                name,
            });
        }
        validators.insert(name, validator);
        Ok(())
    }

    pub fn get(&self, service: &str) -> Option<Arc<dyn ResourceValidator>> {
        self.read().get(&service.trim().to_ascii_lowercase()).cloned()
    }

    /// Sorted service names with a registered validator.
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.read().keys().cloned().collect();
        services.sort();
        services
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn ResourceValidator>>> {
        self.validators.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("services", &self.services())
            .finish()
    }
}
