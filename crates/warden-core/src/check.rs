//! Check conditions attached to a rule.
//!
//! A [`CheckConditions`] value is a bag of optional, independently meaningful
//! predicates. Only a subset applies to any given resource type; which subset is
//! decided by the service's resource validator, not by the struct shape. The
//! [`CheckField`] table is the single place that knows every predicate's external
//! name and how to tell whether it is set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Metadata key/value pair that exempts a resource from a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataMatch {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Predicates a rule evaluates against a resource.
///
/// Every field defaults to its zero value, which means "not specified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConditions {
    /// Resource status equality (e.g. `SHUTOFF`, `available`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,

    /// Age threshold such as `30d`, `12h` or `15m`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub age_gt: String,

    /// Flag resources that nothing references.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unused: bool,

    /// Name patterns (exact or glob) that are never reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exempt_names: Vec<String>,

    /// Metadata entry that exempts a resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exempt_metadata: Option<MetadataMatch>,

    /// Network rule direction (`ingress` / `egress`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub direction: String,

    /// Network rule ethertype (`IPv4` / `IPv6`).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ethertype: String,

    /// Network rule protocol (`tcp`, `udp`, `icmp`, ...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    /// Port that must fall inside the rule's port range.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub port: u16,

    /// Remote prefix, e.g. `0.0.0.0/0` for "open to the world".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote_ip_prefix: String,

    /// Image names that are no longer allowed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_name: Vec<String>,

    /// Flag addresses that are not associated with anything.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unassociated: bool,

    /// Flag ports without any security group.
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_security_group: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(p: &u16) -> bool {
    *p == 0
}

/// One predicate of [`CheckConditions`], identified by its external (document) name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckField {
    Status,
    AgeGt,
    Unused,
    ExemptNames,
    ExemptMetadata,
    Direction,
    Ethertype,
    Protocol,
    Port,
    RemoteIpPrefix,
    ImageName,
    Unassociated,
    NoSecurityGroup,
}

impl CheckField {
    /// Every field, in document order.
    pub const ALL: [CheckField; 13] = [
        CheckField::Status,
        CheckField::AgeGt,
        CheckField::Unused,
        CheckField::ExemptNames,
        CheckField::ExemptMetadata,
        CheckField::Direction,
        CheckField::Ethertype,
        CheckField::Protocol,
        CheckField::Port,
        CheckField::RemoteIpPrefix,
        CheckField::ImageName,
        CheckField::Unassociated,
        CheckField::NoSecurityGroup,
    ];

    /// External name as written in a policy document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::AgeGt => "age_gt",
            Self::Unused => "unused",
            Self::ExemptNames => "exempt_names",
            Self::ExemptMetadata => "exempt_metadata",
            Self::Direction => "direction",
            Self::Ethertype => "ethertype",
            Self::Protocol => "protocol",
            Self::Port => "port",
            Self::RemoteIpPrefix => "remote_ip_prefix",
            Self::ImageName => "image_name",
            Self::Unassociated => "unassociated",
            Self::NoSecurityGroup => "no_security_group",
        }
    }

    /// Look a field up by its external name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }
}

impl fmt::Display for CheckField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CheckConditions {
    /// Whether `field` holds a non-default value.
    pub fn is_set(&self, field: CheckField) -> bool {
        match field {
            CheckField::Status => !self.status.is_empty(),
            CheckField::AgeGt => !self.age_gt.is_empty(),
            CheckField::Unused => self.unused,
            CheckField::ExemptNames => !self.exempt_names.is_empty(),
            CheckField::ExemptMetadata => self.exempt_metadata.is_some(),
            CheckField::Direction => !self.direction.is_empty(),
            CheckField::Ethertype => !self.ethertype.is_empty(),
            CheckField::Protocol => !self.protocol.is_empty(),
            CheckField::Port => self.port != 0,
            CheckField::RemoteIpPrefix => !self.remote_ip_prefix.is_empty(),
            CheckField::ImageName => !self.image_name.is_empty(),
            CheckField::Unassociated => self.unassociated,
            CheckField::NoSecurityGroup => self.no_security_group,
        }
    }

    /// All fields that are set, in document order.
    pub fn set_fields(&self) -> Vec<CheckField> {
        CheckField::ALL
            .into_iter()
            .filter(|f| self.is_set(*f))
            .collect()
    }

    /// External names of all set fields.
    pub fn used_checks(&self) -> Vec<&'static str> {
        self.set_fields().iter().map(CheckField::as_str).collect()
    }

    /// True when no predicate is set at all.
    pub fn is_empty(&self) -> bool {
        self.set_fields().is_empty()
    }

    /// Parse `age_gt` into a duration. An unset threshold yields zero.
    pub fn age_threshold(&self) -> Result<Duration, AgeParseError> {
        parse_age_threshold(&self.age_gt)
    }
}

/// Error returned when an age threshold cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgeParseError {
    #[error("invalid age_gt {0:?}: missing numeric value")]
    MissingValue(String),

    #[error("invalid age_gt {value:?}: value out of range")]
    OutOfRange { value: String },

    #[error("invalid age_gt {value:?}: unsupported unit {unit:?} (supported: d, h, m)")]
    UnsupportedUnit { value: String, unit: String },
}

/// Parse an age threshold of the form `<n>d`, `<n>h` or `<n>m`.
///
/// The empty string means "no threshold" and parses to [`Duration::ZERO`].
pub fn parse_age_threshold(raw: &str) -> Result<Duration, AgeParseError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(Duration::ZERO);
    }

    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    if number.is_empty() {
        return Err(AgeParseError::MissingValue(value.to_string()));
    }
    let amount: u64 = number.parse().map_err(|_| AgeParseError::OutOfRange {
        value: value.to_string(),
    })?;

    let unit_secs = match unit {
        "d" => 24 * 60 * 60,
        "h" => 60 * 60,
        "m" => 60,
        other => {
            return Err(AgeParseError::UnsupportedUnit {
                value: value.to_string(),
                unit: other.to_string(),
            });
        }
    };

    amount
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| AgeParseError::OutOfRange {
            value: value.to_string(),
        })
}
