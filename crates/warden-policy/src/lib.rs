//! # warden-policy
//!
//! Structural and semantic validation of a [`Policy`](warden_core::Policy).
//!
//! Validation runs against two registries that adapter packages populate at
//! startup and that stay read-only afterwards:
//!
//! - [`ResourceCatalog`]: which resource types each service supports.
//! - [`ValidatorRegistry`]: optional per-service [`ResourceValidator`]s that decide
//!   which check fields are meaningful for each resource type.
//!
//! Neither registry hard-codes a service list; a new service only needs a new
//! adapter registration.
//!
//! ## Example
//!
//! ```rust
//! use warden_core::{CheckField, Policy};
//! use warden_policy::{AllowListValidator, PolicyValidator, ResourceCatalog, ValidatorRegistry};
//! use std::sync::Arc;
//!
//! let catalog = ResourceCatalog::new();
//! catalog.register_resource("cinder", "volume");
//!
//! let validators = ValidatorRegistry::new();
//! validators
//!     .register(Arc::new(
//!         AllowListValidator::new("cinder").allow("volume", [CheckField::Status, CheckField::AgeGt]),
//!     ))
//!     .unwrap();
//!
//! let policy = Policy::from_yaml(
//!     "version: v1\npolicies:\n  - cinder:\n      - name: old-volumes\n        resource: volume\n        check: { age_gt: 90d }\n        action: log\n",
//! )
//! .unwrap();
//!
//! PolicyValidator::new(&catalog)
//!     .with_validators(&validators)
//!     .validate(&policy)
//!     .unwrap();
//! ```

pub mod allow_list;
pub mod catalog;
pub mod error;
pub mod registry;
pub mod validator;

pub use allow_list::{AllowListValidator, validate_allowed_checks};
pub use catalog::ResourceCatalog;
pub use error::{PolicyError, PolicyErrorKind, RegistryError};
pub use registry::{ResourceValidator, ValidatorRegistry};
pub use validator::PolicyValidator;
