//! Authenticated session handle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque credential bundle produced by an external authentication step.
///
/// The engine only passes it through to `Service::get_client`; adapters decide
/// which attributes they need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Cloud name (e.g. an entry in a clouds file).
    pub cloud: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Adapter-defined attributes (endpoints, tokens, project scope).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Session {
    pub fn new(cloud: impl Into<String>) -> Self {
        Self {
            cloud: cloud.into(),
            ..Default::default()
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
