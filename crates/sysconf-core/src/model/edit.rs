//! Edit operations delivered by the configuration store at commit time

use super::{DnsServer, Subtree};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Optional module prefix accepted in front of leaf paths
const MODULE_PREFIX: &str = "ietf-system:";

/// Addressable leaves of the managed subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LeafPath {
    Hostname,
    TimezoneName,
    TimezoneUtcOffset,
    DnsSearch,
    DnsServer,
    DnsOptionsTimeout,
    DnsOptionsAttempts,
}

impl LeafPath {
    pub fn as_str(self) -> &'static str {
        match self {
            LeafPath::Hostname => "system/hostname",
            LeafPath::TimezoneName => "system/clock/timezone-name",
            LeafPath::TimezoneUtcOffset => "system/clock/timezone-utc-offset",
            LeafPath::DnsSearch => "system/dns-resolver/search",
            LeafPath::DnsServer => "system/dns-resolver/server",
            LeafPath::DnsOptionsTimeout => "system/dns-resolver/options/timeout",
            LeafPath::DnsOptionsAttempts => "system/dns-resolver/options/attempts",
        }
    }

    /// The subtree this leaf belongs to
    pub fn subtree(self) -> Subtree {
        match self {
            LeafPath::Hostname => Subtree::Hostname,
            LeafPath::TimezoneName | LeafPath::TimezoneUtcOffset => Subtree::Clock,
            LeafPath::DnsSearch
            | LeafPath::DnsServer
            | LeafPath::DnsOptionsTimeout
            | LeafPath::DnsOptionsAttempts => Subtree::DnsResolver,
        }
    }
}

impl std::fmt::Display for LeafPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeafPath {
    type Err = String;

    /// Accepts `system/...`, `/system/...` and `/ietf-system:system/...`.
    /// List entries may carry a key predicate (`server[name='ns1']`) and
    /// server paths may point below the entry (`.../udp-and-tcp/address`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('/');
        let trimmed = trimmed.strip_prefix(MODULE_PREFIX).unwrap_or(trimmed);

        let mut segments = trimmed.split('/').map(|seg| match seg.find('[') {
            Some(idx) => &seg[..idx],
            None => seg,
        });

        let path = match (segments.next(), segments.next(), segments.next()) {
            (Some("system"), Some("hostname"), None) => LeafPath::Hostname,
            (Some("system"), Some("clock"), Some("timezone-name")) => LeafPath::TimezoneName,
            (Some("system"), Some("clock"), Some("timezone-utc-offset")) => {
                LeafPath::TimezoneUtcOffset
            }
            (Some("system"), Some("dns-resolver"), Some("search")) => LeafPath::DnsSearch,
            (Some("system"), Some("dns-resolver"), Some("server")) => return Ok(LeafPath::DnsServer),
            (Some("system"), Some("dns-resolver"), Some("options")) => {
                match segments.next() {
                    Some("timeout") => LeafPath::DnsOptionsTimeout,
                    Some("attempts") => LeafPath::DnsOptionsAttempts,
                    _ => return Err(format!("unknown leaf path: {s}")),
                }
            }
            _ => return Err(format!("unknown leaf path: {s}")),
        };

        if segments.next().is_some() {
            return Err(format!("unknown leaf path: {s}"));
        }
        Ok(path)
    }
}

impl TryFrom<String> for LeafPath {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LeafPath> for String {
    fn from(path: LeafPath) -> Self {
        path.as_str().to_string()
    }
}

/// A leaf value as exchanged with the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeafValue {
    Integer(i64),
    Text(String),
    Server(DnsServer),
}

impl std::fmt::Display for LeafValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeafValue::Integer(n) => write!(f, "{n}"),
            LeafValue::Text(s) => f.write_str(s),
            LeafValue::Server(server) => write!(f, "{}@{}", server.name, server.address()),
        }
    }
}

/// Store-side edit kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Created,
    Modified,
    Deleted,
}

/// One pending edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Edit {
    pub operation: Operation,
    pub path: LeafPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<LeafValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<LeafValue>,
}

impl Edit {
    /// A created leaf (or a new list entry under merge semantics)
    pub fn created(path: LeafPath, value: LeafValue) -> Self {
        Self {
            operation: Operation::Created,
            path,
            old_value: None,
            new_value: Some(value),
        }
    }

    pub fn modified(path: LeafPath, old_value: Option<LeafValue>, new_value: LeafValue) -> Self {
        Self {
            operation: Operation::Modified,
            path,
            old_value,
            new_value: Some(new_value),
        }
    }

    /// A removed leaf. For list-typed leaves, `old_value: None` clears the list.
    pub fn deleted(path: LeafPath, old_value: Option<LeafValue>) -> Self {
        Self {
            operation: Operation::Deleted,
            path,
            old_value,
            new_value: None,
        }
    }
}

/// The unit of commit: all edits of one store transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    #[serde(default)]
    pub edits: Vec<Edit>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, edit: Edit) -> Self {
        self.edits.push(edit);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }
}

impl From<Vec<Edit>> for ChangeBatch {
    fn from(edits: Vec<Edit>) -> Self {
        Self { edits }
    }
}
