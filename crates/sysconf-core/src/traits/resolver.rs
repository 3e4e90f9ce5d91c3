// # Resolver Service Trait
//
// Defines the interface to the per-link DNS resolver service.
//
// ## Implementations
//
// - systemd-resolved over D-Bus: `sysconf-os` crate
//
// ## Full Replacement
//
// Every setter replaces the complete ordered list for the link. There is no
// add/remove call on purpose: list order and membership are part of what the
// daemon promises, and only a full replacement keeps them exact.

use crate::model::{ResolvedServer, ResolverOptions, TaggedAddress};
use async_trait::async_trait;

/// Trait for resolver service implementations
///
/// All calls are scoped by a link (network interface index) supplied by the
/// deployment environment.
#[async_trait]
pub trait ResolverService: Send + Sync {
    /// Replace the link's search domains. An empty list clears them.
    async fn set_link_domains(&self, link: i32, domains: &[String]) -> Result<(), crate::Error>;

    /// Live search domains of the link, in service order
    async fn link_domains(&self, link: i32) -> Result<Vec<String>, crate::Error>;

    /// Replace the link's servers through the address-only interface
    ///
    /// Only usable when no record carries a name: this interface has no
    /// place for one and would silently drop it.
    async fn set_link_dns(&self, link: i32, servers: &[TaggedAddress])
    -> Result<(), crate::Error>;

    /// Live server addresses of the link from the address-only interface,
    /// in service order
    async fn link_dns(&self, link: i32) -> Result<Vec<TaggedAddress>, crate::Error>;

    /// Replace the link's servers through the extended interface, which
    /// keeps each record's name alongside its address
    async fn set_link_dns_ex(
        &self,
        link: i32,
        servers: &[ResolvedServer],
    ) -> Result<(), crate::Error>;

    /// Live servers of the link from the extended interface, in service order
    async fn link_dns_ex(&self, link: i32) -> Result<Vec<ResolvedServer>, crate::Error>;

    /// Pass resolver tuning knobs through to the service
    async fn set_link_options(
        &self,
        link: i32,
        options: &ResolverOptions,
    ) -> Result<(), crate::Error>;

    /// Service name (for logging and error attribution)
    fn service_name(&self) -> &'static str;
}
