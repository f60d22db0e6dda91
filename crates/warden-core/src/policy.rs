//! Policy document types.
//!
//! The on-disk document groups rules by service:
//!
//! ```yaml
//! version: v1
//! defaults:
//!   workers: 8
//!   output: findings.jsonl
//! policies:
//!   - nova:
//!       - name: stale-instances
//!         resource: instance
//!         check:
//!           age_gt: 30d
//!         action: tag
//!         tag_name: stale
//! ```
//!
//! Loading only produces the in-memory shape; structural and semantic checks live
//! in `warden-policy`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::check::CheckConditions;
use crate::config::ConfigError;

/// Worker count used when neither the policy nor the caller sets one.
pub const DEFAULT_WORKERS: usize = 16;

/// The full declarative ruleset for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Policy {
    /// Document version (required).
    pub version: String,

    /// Run defaults carried by the document.
    pub defaults: PolicyDefaults,

    /// Service policies, in document order.
    pub policies: Vec<ServicePolicy>,
}

/// Defaults section of a policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefaults {
    /// Worker count; zero means "not set".
    #[serde(default)]
    pub workers: usize,

    /// Findings output target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// The rules for one cloud service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServicePolicy {
    pub service: String,
    pub rules: Vec<Rule>,
}

/// One named check + action pair scoped to a service and resource type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule name, unique across the whole policy.
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Owning service. Defaults to the enclosing service key when loaded.
    #[serde(default)]
    pub service: String,

    /// Resource type within the service (e.g. `instance`, `security_group`).
    #[serde(default)]
    pub resource: String,

    #[serde(default)]
    pub check: CheckConditions,

    /// Remediation action: `log`, `delete` or `tag`.
    #[serde(default)]
    pub action: String,

    /// Tag applied by the `tag` action.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag_name: String,

    /// Fallback tag name used by adapters when `tag_name` is empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action_tag_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,

    /// Reference into an operator guide.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub guide_ref: String,
}

impl Rule {
    /// Parsed action, or `None` when the action string is not supported.
    pub fn remediation_action(&self) -> Option<Action> {
        Action::parse(&self.action)
    }

    /// Tag to apply for the `tag` action, preferring `tag_name`.
    pub fn effective_tag_name(&self) -> Option<&str> {
        [self.tag_name.as_str(), self.action_tag_name.as_str()]
            .into_iter()
            .find(|t| !t.is_empty())
    }
}

/// Remediation action named by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Report only.
    Log,
    /// Delete the resource.
    Delete,
    /// Tag the resource.
    Tag,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Log, Action::Delete, Action::Tag];

    /// Case-insensitive parse.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "log" => Some(Self::Log),
            "delete" => Some(Self::Delete),
            "tag" => Some(Self::Tag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Delete => "delete",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw document shape: `policies` is a list of single-key maps `service -> rules`.
#[derive(Deserialize)]
struct PolicyDocument {
    #[serde(default)]
    version: String,
    #[serde(default)]
    defaults: PolicyDefaults,
    #[serde(default)]
    policies: Vec<serde_yaml::Mapping>,
}

impl Policy {
    /// Load a policy document from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a policy document from YAML content.
    ///
    /// Rules without an explicit `service` inherit their parent service key.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let doc: PolicyDocument = serde_yaml::from_str(content)?;

        let mut policies = Vec::new();
        for entry in doc.policies {
            for (key, value) in entry {
                let service = match key {
                    serde_yaml::Value::String(s) => s,
                    other => {
                        return Err(ConfigError::Config(format!(
                            "policies: service key must be a string, got {:?}",
                            other
                        )));
                    }
                };

                let mut rules: Vec<Rule> = if value.is_null() {
                    Vec::new()
                } else {
                    serde_yaml::from_value(value)?
                };
                for rule in &mut rules {
                    if rule.service.is_empty() {
                        rule.service = service.clone();
                    }
                }

                policies.push(ServicePolicy { service, rules });
            }
        }

        Ok(Self {
            version: doc.version,
            defaults: doc.defaults,
            policies,
        })
    }

    /// Every rule in document order, with `service` defaulted from its parent.
    pub fn all_rules(&self) -> Vec<Rule> {
        self.policies
            .iter()
            .flat_map(|sp| {
                sp.rules.iter().map(move |rule| {
                    let mut rule = rule.clone();
                    if rule.service.is_empty() {
                        rule.service = sp.service.clone();
                    }
                    rule
                })
            })
            .collect()
    }

    /// Total number of rules across all services.
    pub fn rule_count(&self) -> usize {
        self.policies.iter().map(|sp| sp.rules.len()).sum()
    }

    /// Worker count: policy default, then `fallback`, then [`DEFAULT_WORKERS`].
    pub fn effective_workers(&self, fallback: usize) -> usize {
        if self.defaults.workers > 0 {
            self.defaults.workers
        } else if fallback > 0 {
            fallback
        } else {
            DEFAULT_WORKERS
        }
    }
}
