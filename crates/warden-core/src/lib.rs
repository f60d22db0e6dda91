//! # warden-core
//!
//! Shared model for the Warden policy engine.
//!
//! - [`Policy`] / [`ServicePolicy`] / [`Rule`]: the declarative ruleset for one run,
//!   loaded from the service-keyed YAML document.
//! - [`CheckConditions`]: the predicate bag attached to a rule, with an explicit
//!   [`CheckField`] table describing which predicates are set.
//! - [`Job`]: one discovered resource instance queued for evaluation.
//! - [`AuditResult`]: the outcome of evaluating one job against one rule.
//! - [`RunOptions`]: concurrency and remediation settings for a run.

pub mod check;
pub mod config;
pub mod job;
pub mod policy;
pub mod result;
pub mod session;

pub use check::{AgeParseError, CheckConditions, CheckField, MetadataMatch, parse_age_threshold};
pub use config::{ConfigError, LogConfig, LogFormat, RunOptions};
pub use job::Job;
pub use policy::{Action, Policy, PolicyDefaults, Rule, ServicePolicy};
pub use result::{AuditResult, ErrorKind, PhaseError, RemediationOutcome, SkipReason};
pub use session::Session;
