//! Adapter contracts implemented per cloud service and resource type.
//!
//! A [`Service`] bundles an authenticated-client factory with lookups for the
//! [`Discoverer`] and [`Auditor`] of each resource type it supports. Adapters
//! return `anyhow::Result` so they can attach whatever context their client
//! library provides; the orchestrator turns those errors into tagged
//! [`PhaseError`](warden_core::PhaseError)s on the results.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{AuditResult, CheckField, Job, Rule, Session};

use crate::cancel::CancelToken;
use crate::discovery::JobStream;
use crate::error::LookupError;

/// An authenticated, service-specific client.
///
/// The runtime never looks inside; adapters recover their concrete type with
/// [`downcast_client`]. Clients are shared read-only by every worker of a run.
pub type ServiceClient = Arc<dyn Any + Send + Sync>;

/// Recover the concrete client type created by a [`Service`].
pub fn downcast_client<T: Any + Send + Sync>(client: &ServiceClient) -> anyhow::Result<Arc<T>> {
    Arc::clone(client)
        .downcast::<T>()
        .map_err(|_| anyhow::anyhow!("client is not a {}", std::any::type_name::<T>()))
}

#[async_trait]
pub trait Service: Send + Sync {
    /// Registry name, e.g. `nova`.
    fn name(&self) -> &str;

    /// Create an authenticated client for this service.
    async fn get_client(&self, session: &Session) -> anyhow::Result<ServiceClient>;

    fn resource_auditor(&self, resource_type: &str) -> Result<Arc<dyn Auditor>, LookupError>;

    fn resource_discoverer(&self, resource_type: &str)
    -> Result<Arc<dyn Discoverer>, LookupError>;
}

#[async_trait]
pub trait Discoverer: Send + Sync {
    fn resource_type(&self) -> &str;

    /// Start enumerating live resources.
    ///
    /// The returned stream is finite and not restartable. It is fed by a
    /// background task that closes it when discovery ends, fails, or `cancel`
    /// fires.
    async fn discover(
        &self,
        cancel: CancelToken,
        client: ServiceClient,
        all_tenants: bool,
    ) -> anyhow::Result<JobStream>;
}

#[async_trait]
pub trait Auditor: Send + Sync {
    fn resource_type(&self) -> &str;

    /// Check fields this auditor evaluates. Empty means "not declared", which
    /// disables coverage warnings.
    fn implemented_checks(&self) -> &[CheckField] {
        &[]
    }

    /// Evaluate one resource against one rule. Must not mutate remote state.
    async fn check(
        &self,
        cancel: &CancelToken,
        job: &Job,
        rule: &Rule,
    ) -> anyhow::Result<AuditResult>;

    /// Apply the rule's action to the resource.
    async fn fix(
        &self,
        cancel: &CancelToken,
        client: &ServiceClient,
        job: &Job,
        rule: &Rule,
    ) -> anyhow::Result<()>;
}
