//! Counting event sink.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use warden_runtime::{EventSink, RunEvent};

/// Counts every run event. Cheap to share behind `Arc` across a run.
#[derive(Debug, Default)]
pub struct EventCounters {
    scanned: AtomicU64,
    violations: AtomicU64,
    evaluation_errors: AtomicU64,
    remediation_attempted: AtomicU64,
    remediated: AtomicU64,
    remediation_failed: AtomicU64,
    remediation_skipped: AtomicU64,
    discovery_errors: AtomicU64,
    client_errors: AtomicU64,
    service_not_found: AtomicU64,
    discoverer_not_found: AtomicU64,
    auditor_not_found: AtomicU64,
}

/// Point-in-time copy of [`EventCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub scanned: u64,
    pub violations: u64,
    pub evaluation_errors: u64,
    pub remediation_attempted: u64,
    pub remediated: u64,
    pub remediation_failed: u64,
    pub remediation_skipped: u64,
    pub discovery_errors: u64,
    pub client_errors: u64,
    pub service_not_found: u64,
    pub discoverer_not_found: u64,
    pub auditor_not_found: u64,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, event: &RunEvent) -> &AtomicU64 {
        match event {
            RunEvent::ResourceScanned { .. } => &self.scanned,
            RunEvent::ViolationFound { .. } => &self.violations,
            RunEvent::EvaluationError { .. } => &self.evaluation_errors,
            RunEvent::RemediationAttempted { .. } => &self.remediation_attempted,
            RunEvent::RemediationSucceeded { .. } => &self.remediated,
            RunEvent::RemediationFailed { .. } => &self.remediation_failed,
            RunEvent::RemediationSkipped { .. } => &self.remediation_skipped,
            RunEvent::DiscoveryError { .. } => &self.discovery_errors,
            RunEvent::ClientError { .. } => &self.client_errors,
            RunEvent::ServiceNotFound { .. } => &self.service_not_found,
            RunEvent::DiscovererNotFound { .. } => &self.discoverer_not_found,
            RunEvent::AuditorNotFound { .. } => &self.auditor_not_found,
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            scanned: load(&self.scanned),
            violations: load(&self.violations),
            evaluation_errors: load(&self.evaluation_errors),
            remediation_attempted: load(&self.remediation_attempted),
            remediated: load(&self.remediated),
            remediation_failed: load(&self.remediation_failed),
            remediation_skipped: load(&self.remediation_skipped),
            discovery_errors: load(&self.discovery_errors),
            client_errors: load(&self.client_errors),
            service_not_found: load(&self.service_not_found),
            discoverer_not_found: load(&self.discoverer_not_found),
            auditor_not_found: load(&self.auditor_not_found),
        }
    }
}

impl EventSink for EventCounters {
    fn record(&self, event: &RunEvent) {
        self.counter(event).fetch_add(1, Ordering::Relaxed);
    }
}
