//! Advisory run events.
//!
//! The orchestrator reports what happens during a run to an [`EventSink`]. Sinks
//! observe only: they cannot influence scheduling, and a slow sink slows only
//! the task that reports to it.

use std::fmt;

use tracing::debug;
use warden_core::{Action, SkipReason};

/// Something that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A job was taken from the queue and evaluated.
    ResourceScanned {
        service: String,
        resource_type: String,
    },
    ViolationFound {
        service: String,
        resource_type: String,
        rule: String,
    },
    /// A check failed with an audit-phase error.
    EvaluationError {
        service: String,
        resource_type: String,
        rule: String,
    },
    RemediationAttempted {
        service: String,
        resource_type: String,
        action: Action,
    },
    RemediationSucceeded {
        service: String,
        resource_type: String,
        action: Action,
    },
    RemediationFailed {
        service: String,
        resource_type: String,
        action: Action,
    },
    RemediationSkipped {
        service: String,
        resource_type: String,
        reason: SkipReason,
    },
    /// A discoverer could not start.
    DiscoveryError {
        service: String,
        resource_type: String,
    },
    /// The service's client could not be created.
    ClientError { service: String },
    ServiceNotFound { service: String },
    DiscovererNotFound {
        service: String,
        resource_type: String,
    },
    AuditorNotFound {
        service: String,
        resource_type: String,
    },
}

impl RunEvent {
    /// Stable event name, suitable as a metric name suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResourceScanned { .. } => "resource_scanned",
            Self::ViolationFound { .. } => "violation_found",
            Self::EvaluationError { .. } => "evaluation_error",
            Self::RemediationAttempted { .. } => "remediation_attempted",
            Self::RemediationSucceeded { .. } => "remediation_succeeded",
            Self::RemediationFailed { .. } => "remediation_failed",
            Self::RemediationSkipped { .. } => "remediation_skipped",
            Self::DiscoveryError { .. } => "discovery_error",
            Self::ClientError { .. } => "client_error",
            Self::ServiceNotFound { .. } => "service_not_found",
            Self::DiscovererNotFound { .. } => "discoverer_not_found",
            Self::AuditorNotFound { .. } => "auditor_not_found",
        }
    }

    pub fn service(&self) -> &str {
        match self {
            Self::ResourceScanned { service, .. }
            | Self::ViolationFound { service, .. }
            | Self::EvaluationError { service, .. }
            | Self::RemediationAttempted { service, .. }
            | Self::RemediationSucceeded { service, .. }
            | Self::RemediationFailed { service, .. }
            | Self::RemediationSkipped { service, .. }
            | Self::DiscoveryError { service, .. }
            | Self::ClientError { service }
            | Self::ServiceNotFound { service }
            | Self::DiscovererNotFound { service, .. }
            | Self::AuditorNotFound { service, .. } => service,
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.service())
    }
}

/// Receiver of run events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &RunEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &RunEvent) {}
}

/// Emits every event as a `debug` log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &RunEvent) {
        debug!(event = event.name(), service = event.service(), "run event");
    }
}
