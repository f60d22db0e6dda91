//! Per-run cache of authenticated service clients.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::Mutex;
use tracing::debug;
use warden_core::Session;

use crate::adapter::{Service, ServiceClient};

/// Lazily created, memoized clients keyed by service name, normalized the way
/// [`ServiceRegistry`](crate::registry::ServiceRegistry) normalizes it.
///
/// Creation is serialized by one async lock so a client is built at most once
/// per service even when several tasks ask for it together. Cached clients are
/// read-only and handed out behind `Arc`.
#[derive(Default)]
pub struct ClientCache {
    clients: RwLock<HashMap<String, ServiceClient>>,
    create: Mutex<()>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached client for `service`, if one was created.
    pub fn cached(&self, service: &str) -> Option<ServiceClient> {
        self.clients
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&cache_key(service))
            .cloned()
    }

    /// Return the cached client for `service` or create it from `session`.
    ///
    /// A failed creation is not cached.
    pub async fn get_or_create(
        &self,
        service: &dyn Service,
        session: &Session,
    ) -> anyhow::Result<ServiceClient> {
        let key = cache_key(service.name());
        if let Some(client) = self.cached(&key) {
            return Ok(client);
        }

        let _guard = self.create.lock().await;
        if let Some(client) = self.cached(&key) {
            return Ok(client);
        }

        debug!(service = %key, "creating client");
        let client = service.get_client(session).await?;
        self.clients
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cache_key(service: &str) -> String {
    service.trim().to_ascii_lowercase()
}
