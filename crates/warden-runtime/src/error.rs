use thiserror::Error;

/// A service, discoverer or auditor could not be resolved at run time.
///
/// Lookup failures are scoped to one `(service, resource type)` unit; the rest
/// of the run proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("service '{0}' is not registered")]
    ServiceNotFound(String),

    #[error("service '{service}' has no discoverer for resource type '{resource_type}'")]
    DiscovererNotFound {
        service: String,
        resource_type: String,
    },

    #[error("service '{service}' has no auditor for resource type '{resource_type}'")]
    AuditorNotFound {
        service: String,
        resource_type: String,
    },
}

impl LookupError {
    pub fn discoverer(service: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self::DiscovererNotFound {
            service: service.into(),
            resource_type: resource_type.into(),
        }
    }

    pub fn auditor(service: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self::AuditorNotFound {
            service: service.into(),
            resource_type: resource_type.into(),
        }
    }
}

/// Failure while tearing a run down.
#[derive(Debug, Error)]
pub enum RunError {
    /// A producer, worker or supervisor task panicked.
    #[error("run task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
