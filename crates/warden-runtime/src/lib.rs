//! # warden-runtime
//!
//! Adapter contracts and the run orchestrator.
//!
//! ## Adapter contracts
//!
//! | trait          | implemented per      | responsibility                              |
//! |----------------|----------------------|---------------------------------------------|
//! | [`Service`]    | cloud service        | client factory, discoverer/auditor lookup   |
//! | [`Discoverer`] | resource type        | enumerate live resources as [`JobStream`]   |
//! | [`Auditor`]    | resource type        | `check` (read-only) and `fix` (mutating)    |
//!
//! Adapters register into a [`Registries`] bundle at startup; the
//! [`Orchestrator`] only ever reads it.
//!
//! ## Running
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_core::{Policy, RunOptions, Session};
//! use warden_runtime::{Orchestrator, Registries};
//!
//! # async fn example(policy: Policy) -> anyhow::Result<()> {
//! let registries = Registries::global();
//! registries.policy_validator().validate(&policy)?;
//!
//! let orchestrator = Orchestrator::new(
//!     policy,
//!     Session::new("prod"),
//!     registries.services.clone(),
//!     RunOptions::default().with_apply(true),
//! );
//! let mut results = orchestrator.run();
//! while let Some(result) = results.recv().await {
//!     println!("{} {} compliant={}", result.rule_name, result.resource_id, result.compliant);
//! }
//! results.join().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod cancel;
pub mod checks;
pub mod client;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod registry;

pub use adapter::{Auditor, Discoverer, Service, ServiceClient, downcast_client};
pub use cancel::CancelToken;
pub use checks::{
    ResourceView, base_result, check_age, check_status, exempt_by_metadata, exempt_by_name,
    run_common_checks,
};
pub use client::ClientCache;
pub use discovery::{DEFAULT_DISCOVERY_BUFFER, JobStream, discover_paged, simple_job_creator};
pub use error::{LookupError, RunError};
pub use hooks::{EventSink, NoopSink, RunEvent, TracingSink};
pub use orchestrator::{Orchestrator, ResultStream, RuleIndex, UncoveredCheck, uncovered_checks};
pub use registry::{Registries, ServiceRegistry};
