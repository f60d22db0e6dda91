//! Registry of supported resource types per service.
//!
//! Adapter packages register their `(service, resource type)` pairs at startup;
//! validation reads the catalog afterwards. Names are stored lowercase so that
//! `Nova` and `nova` refer to the same service.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Service name -> supported resource types.
#[derive(Debug, Default)]
pub struct ResourceCatalog {
    entries: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl ResourceCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `resource_type` as supported by `service`. Idempotent.
    pub fn register_resource(&self, service: &str, resource_type: &str) {
        let service = normalize(service);
        let resource_type = normalize(resource_type);
        if service.is_empty() || resource_type.is_empty() {
            return;
        }
        self.write()
            .entry(service)
            .or_default()
            .insert(resource_type);
    }

    /// Register several resource types for one service.
    pub fn register_resources<I, S>(&self, service: &str, resource_types: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for resource_type in resource_types {
            self.register_resource(service, resource_type.as_ref());
        }
    }

    pub fn is_service_supported(&self, service: &str) -> bool {
        self.read().contains_key(&normalize(service))
    }

    pub fn is_resource_supported(&self, service: &str, resource_type: &str) -> bool {
        self.read()
            .get(&normalize(service))
            .is_some_and(|types| types.contains(&normalize(resource_type)))
    }

    /// Sorted resource types for `service` (empty when unknown).
    pub fn service_resources(&self, service: &str) -> Vec<String> {
        self.read()
            .get(&normalize(service))
            .map(|types| types.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted service names.
    pub fn services(&self) -> Vec<String> {
        let mut services: Vec<String> = self.read().keys().cloned().collect();
        services.sort();
        services
    }

    /// Full `service -> resource types` copy.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.read()
            .iter()
            .map(|(service, types)| (service.clone(), types.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // The map holds plain data, so a poisoned lock is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, BTreeSet<String>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, BTreeSet<String>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
