//! Service registry and the registry bundle used to wire adapters in.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

use warden_policy::{
    PolicyValidator, RegistryError, ResourceCatalog, ResourceValidator, ValidatorRegistry,
};

use crate::adapter::Service;
use crate::error::LookupError;

/// Service name -> [`Service`] implementation.
///
/// Populated once while adapters initialize, read-only afterwards.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn Service>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service` under its name. A name that is already taken is
    /// rejected rather than shadowed.
    pub fn register(&self, service: Arc<dyn Service>) -> Result<(), RegistryError> {
        let name = service.name().trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(RegistryError::EmptyName { kind: "service" });
        }

        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        if services.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered {
                kind: "service",
                name,
            });
        }
        services.insert(name, service);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Service>, LookupError> {
        let key = name.trim().to_ascii_lowercase();
        self.read()
            .get(&key)
            .cloned()
            .ok_or(LookupError::ServiceNotFound(key))
    }

    /// Sorted service names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<dyn Service>>> {
        self.services.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}

/// The three registries an adapter package populates.
///
/// Tests build isolated instances with [`Registries::new`]; binaries that rely
/// on self-registering adapters share [`Registries::global`].
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub catalog: Arc<ResourceCatalog>,
    pub validators: Arc<ValidatorRegistry>,
    pub services: Arc<ServiceRegistry>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registries.
    pub fn global() -> &'static Registries {
        static GLOBAL: OnceLock<Registries> = OnceLock::new();
        GLOBAL.get_or_init(Registries::new)
    }

    /// Register a service adapter together with the resource types it supports
    /// and, optionally, its check validator.
    ///
    /// All-or-nothing: every name is checked before any registry is written, so
    /// a rejected adapter leaves the bundle untouched and can be retried.
    pub fn register_adapter<I, S>(
        &self,
        service: Arc<dyn Service>,
        resource_types: I,
        validator: Option<Arc<dyn ResourceValidator>>,
    ) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = service.name().trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(RegistryError::EmptyName { kind: "service" });
        }
        if self.services.get(&name).is_ok() {
            return Err(RegistryError::AlreadyRegistered {
                kind: "service",
                name,
            });
        }
        if let Some(validator) = &validator {
            let validator_name = validator.service_name().trim().to_ascii_lowercase();
            if validator_name != name {
                return Err(RegistryError::ValidatorMismatch {
                    service: name,
                    validator: validator_name,
                });
            }
            if self.validators.get(&name).is_some() {
                return Err(RegistryError::AlreadyRegistered {
                    kind: "validator",
                    name,
                });
            }
        }

        if let Some(validator) = validator {
            self.validators.register(validator)?;
        }
        self.services.register(service)?;
        self.catalog.register_resources(&name, resource_types);
        Ok(())
    }

    /// A validator wired to this bundle's catalog and validators.
    pub fn policy_validator(&self) -> PolicyValidator<'_> {
        PolicyValidator::new(&self.catalog).with_validators(&self.validators)
    }
}
