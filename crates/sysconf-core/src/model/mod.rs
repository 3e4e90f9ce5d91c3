//! Data model for the managed `system` subtree
//!
//! A [`SystemConfig`] is a transient snapshot: it is built per batch from the
//! datastore's running view plus the pending edits, and never cached as a
//! stand-in for live system state.

pub mod edit;

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

pub use edit::{ChangeBatch, Edit, LeafPath, LeafValue, Operation};

/// The managed configuration subtree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystemConfig {
    /// Static hostname
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    /// Clock settings (zone name XOR UTC offset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<Clock>,

    /// Resolver settings
    #[serde(default)]
    pub dns_resolver: DnsResolverConfig,
}

impl SystemConfig {
    /// Current values of a leaf, in list order for list-typed leaves
    pub fn leaf_values(&self, path: LeafPath) -> Vec<LeafValue> {
        match path {
            LeafPath::Hostname => self
                .hostname
                .iter()
                .map(|h| LeafValue::Text(h.clone()))
                .collect(),
            LeafPath::TimezoneName => match &self.clock {
                Some(Clock::TimezoneName(name)) => vec![LeafValue::Text(name.clone())],
                _ => Vec::new(),
            },
            LeafPath::TimezoneUtcOffset => match &self.clock {
                Some(Clock::TimezoneUtcOffset(minutes)) => {
                    vec![LeafValue::Integer(i64::from(*minutes))]
                }
                _ => Vec::new(),
            },
            LeafPath::DnsSearch => self
                .dns_resolver
                .search
                .iter()
                .map(|s| LeafValue::Text(s.clone()))
                .collect(),
            LeafPath::DnsServer => self
                .dns_resolver
                .server
                .iter()
                .map(|s| LeafValue::Server(s.clone()))
                .collect(),
            LeafPath::DnsOptionsTimeout => vec![LeafValue::Integer(i64::from(
                self.dns_resolver.options.timeout_secs,
            ))],
            LeafPath::DnsOptionsAttempts => vec![LeafValue::Integer(i64::from(
                self.dns_resolver.options.attempts,
            ))],
        }
    }
}

/// Clock choice. Exactly one case is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Clock {
    /// Zone database entry, e.g. `Europe/Berlin`
    TimezoneName(String),
    /// Signed offset from UTC in minutes
    TimezoneUtcOffset(i16),
}

/// `system/dns-resolver`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsResolverConfig {
    /// Ordered search domains
    #[serde(default)]
    pub search: Vec<String>,

    /// Ordered name servers; duplicates are kept as-is
    #[serde(default)]
    pub server: Vec<DnsServer>,

    /// Resolver tuning knobs
    #[serde(default)]
    pub options: ResolverOptions,
}

/// A configured name server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DnsServer {
    /// Free-text server name
    pub name: String,

    /// Transport; only UDP-and-TCP is modeled
    #[serde(rename = "udp-and-tcp")]
    pub transport: UdpAndTcp,
}

/// `udp-and-tcp` transport container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UdpAndTcp {
    /// Server address as written by the client
    pub address: String,
}

impl DnsServer {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: UdpAndTcp {
                address: address.into(),
            },
        }
    }

    pub fn address(&self) -> &str {
        &self.transport.address
    }
}

/// `system/dns-resolver/options`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Seconds to wait for a response
    #[serde(rename = "timeout", default = "default_timeout")]
    pub timeout_secs: u8,

    /// Attempts per server
    #[serde(default = "default_attempts")]
    pub attempts: u8,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            attempts: default_attempts(),
        }
    }
}

fn default_timeout() -> u8 {
    5
}

fn default_attempts() -> u8 {
    2
}

/// Address family tag exchanged with the resolver service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Linux `AF_INET`
    pub const RAW_INET: i32 = 2;
    /// Linux `AF_INET6`
    pub const RAW_INET6: i32 = 10;

    /// Numeric tag as carried on the wire
    pub fn raw(self) -> i32 {
        match self {
            AddressFamily::Ipv4 => Self::RAW_INET,
            AddressFamily::Ipv6 => Self::RAW_INET6,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            Self::RAW_INET => Some(AddressFamily::Ipv4),
            Self::RAW_INET6 => Some(AddressFamily::Ipv6),
            _ => None,
        }
    }

    /// Number of address bytes for this family
    pub fn address_len(self) -> usize {
        match self {
            AddressFamily::Ipv4 => 4,
            AddressFamily::Ipv6 => 16,
        }
    }
}

/// A validated address, decomposed into family tag and raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaggedAddress {
    pub family: AddressFamily,
    pub raw: Vec<u8>,
}

impl TaggedAddress {
    pub fn to_ip(&self) -> Option<IpAddr> {
        match self.family {
            AddressFamily::Ipv4 => {
                let octets: [u8; 4] = self.raw.as_slice().try_into().ok()?;
                Some(IpAddr::from(octets))
            }
            AddressFamily::Ipv6 => {
                let octets: [u8; 16] = self.raw.as_slice().try_into().ok()?;
                Some(IpAddr::from(octets))
            }
        }
    }
}

impl From<IpAddr> for TaggedAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self {
                family: AddressFamily::Ipv4,
                raw: v4.octets().to_vec(),
            },
            IpAddr::V6(v6) => Self {
                family: AddressFamily::Ipv6,
                raw: v6.octets().to_vec(),
            },
        }
    }
}

/// A server record in the resolver service's extended representation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedServer {
    pub address: TaggedAddress,
    /// Human-readable server name; empty when the service has none
    pub name: String,
}

impl ResolvedServer {
    /// Rebuild the configuration-side record. `None` when the raw bytes do
    /// not fit the family tag.
    pub fn to_server(&self) -> Option<DnsServer> {
        let ip = self.address.to_ip()?;
        Some(DnsServer::new(self.name.clone(), ip.to_string()))
    }
}

/// Top-level configuration subtrees, in apply order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subtree {
    Hostname,
    Clock,
    DnsResolver,
}

impl Subtree {
    /// Fixed apply order
    pub const APPLY_ORDER: [Subtree; 3] = [Subtree::Hostname, Subtree::Clock, Subtree::DnsResolver];
}

impl std::fmt::Display for Subtree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Subtree::Hostname => "hostname",
            Subtree::Clock => "clock",
            Subtree::DnsResolver => "dns-resolver",
        })
    }
}

/// Platform identification reported as operational state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlatformInfo {
    pub os_name: String,
    pub os_release: String,
    pub os_version: String,
    pub machine: String,
}
