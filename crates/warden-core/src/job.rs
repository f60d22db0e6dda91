//! Discovered resource instances.

use serde::{Deserialize, Serialize};

/// One discovered resource instance queued for evaluation.
///
/// Created by a discoverer and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Owning service name.
    pub service: String,

    /// Resource type within the service.
    pub resource_type: String,

    /// Stable resource identifier (never empty).
    pub resource_id: String,

    /// Owning project / tenant, when the platform reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Adapter-specific payload, interpreted only by the matching auditor.
    pub resource: serde_json::Value,
}

impl Job {
    pub fn new(
        service: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        resource: serde_json::Value,
    ) -> Self {
        Self {
            service: service.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            project_id: None,
            resource,
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        self.project_id = (!project_id.is_empty()).then_some(project_id);
        self
    }
}
