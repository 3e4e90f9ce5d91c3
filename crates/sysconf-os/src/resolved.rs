// # systemd-resolved Adapter
//
// Per-link resolver configuration through `org.freedesktop.resolve1`.
//
// ## Calls
//
// - `SetLinkDomains(i, a(sb))`: full replacement of the link's domains
// - `SetLinkDNS(i, a(iay))`: full replacement, address only
// - `SetLinkDNSEx(i, a(iayqs))`: full replacement, with port and server name
// - `Domains` `a(isb)` / `DNS` `a(iiay)` / `DNSEx` `a(iiayqs)`: manager-wide
//   lists, filtered here by link index
//
// Properties are read without the proxy's property cache so that every read
// reflects the service's current state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysconf_core::call::bounded;
use sysconf_core::model::{AddressFamily, ResolvedServer, ResolverOptions, TaggedAddress};
use sysconf_core::{ResolverService, Result};
use tracing::{debug, info, warn};
use zbus::proxy;
use zbus::proxy::CacheProperties;

use crate::bus::SystemBus;

const SERVICE: &str = "resolve1";

/// Port 0 lets resolved use the default DNS port
const DEFAULT_PORT: u16 = 0;

type DomainEntry = (i32, String, bool);
type AddressEntry = (i32, i32, Vec<u8>);
type ServerEntry = (i32, i32, Vec<u8>, u16, String);

#[proxy(
    interface = "org.freedesktop.resolve1.Manager",
    default_service = "org.freedesktop.resolve1",
    default_path = "/org/freedesktop/resolve1",
    gen_blocking = false
)]
trait Resolve1Manager {
    /// Domains as `(domain, routing_only)`
    fn set_link_domains(&self, ifindex: i32, domains: &[(&str, bool)]) -> zbus::Result<()>;

    /// Servers as `(family, address)`
    #[zbus(name = "SetLinkDNS")]
    fn set_link_dns(&self, ifindex: i32, addresses: &[(i32, &[u8])]) -> zbus::Result<()>;

    /// Servers as `(family, address, port, server_name)`
    #[zbus(name = "SetLinkDNSEx")]
    fn set_link_dns_ex(
        &self,
        ifindex: i32,
        addresses: &[(i32, &[u8], u16, &str)],
    ) -> zbus::Result<()>;

    #[zbus(property)]
    fn domains(&self) -> zbus::Result<Vec<DomainEntry>>;

    #[zbus(property, name = "DNS")]
    fn dns(&self) -> zbus::Result<Vec<AddressEntry>>;

    #[zbus(property, name = "DNSEx")]
    fn dns_ex(&self) -> zbus::Result<Vec<ServerEntry>>;
}

/// Resolver service backed by systemd-resolved
pub struct Resolved {
    bus: Arc<SystemBus>,
    timeout: Duration,
}

impl Resolved {
    pub fn new(bus: Arc<SystemBus>, timeout: Duration) -> Self {
        Self { bus, timeout }
    }

    async fn proxy(&self) -> Result<Resolve1ManagerProxy<'static>> {
        let conn = self.bus.connection(SERVICE).await?;
        let built = Resolve1ManagerProxy::builder(&conn)
            .cache_properties(CacheProperties::No)
            .build()
            .await;
        self.checked(built).await
    }

    /// Run one proxy call, translating its error
    async fn checked<T>(&self, result: zbus::Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.bus.call_failed(SERVICE, e).await),
        }
    }

    async fn domains(&self, link: i32, domains: &[String]) -> Result<()> {
        let proxy = self.proxy().await?;
        let entries: Vec<(&str, bool)> = domains.iter().map(|d| (d.as_str(), false)).collect();
        self.checked(proxy.set_link_domains(link, &entries).await).await
    }

    async fn dns(&self, link: i32, servers: &[TaggedAddress]) -> Result<()> {
        let proxy = self.proxy().await?;
        let entries: Vec<(i32, &[u8])> = servers
            .iter()
            .map(|s| (s.family.raw(), s.raw.as_slice()))
            .collect();
        self.checked(proxy.set_link_dns(link, &entries).await).await
    }

    async fn dns_ex(&self, link: i32, servers: &[ResolvedServer]) -> Result<()> {
        let proxy = self.proxy().await?;
        let entries: Vec<(i32, &[u8], u16, &str)> = servers
            .iter()
            .map(|s| {
                (
                    s.address.family.raw(),
                    s.address.raw.as_slice(),
                    DEFAULT_PORT,
                    s.name.as_str(),
                )
            })
            .collect();
        self.checked(proxy.set_link_dns_ex(link, &entries).await).await
    }

    async fn read_domains(&self) -> Result<Vec<DomainEntry>> {
        let proxy = self.proxy().await?;
        self.checked(proxy.domains().await).await
    }

    async fn read_dns(&self) -> Result<Vec<AddressEntry>> {
        let proxy = self.proxy().await?;
        self.checked(proxy.dns().await).await
    }

    async fn read_dns_ex(&self) -> Result<Vec<ServerEntry>> {
        let proxy = self.proxy().await?;
        self.checked(proxy.dns_ex().await).await
    }
}

/// Search domains of `link`, in service order. Routing-only domains are
/// not search domains and are skipped.
fn link_domains_of(entries: Vec<DomainEntry>, link: i32) -> Vec<String> {
    entries
        .into_iter()
        .filter(|(ifindex, _, routing_only)| *ifindex == link && !routing_only)
        .map(|(_, domain, _)| domain)
        .collect()
}

/// Server addresses of `link`, in service order
fn link_addresses_of(entries: Vec<AddressEntry>, link: i32) -> Vec<TaggedAddress> {
    entries
        .into_iter()
        .filter(|(ifindex, ..)| *ifindex == link)
        .filter_map(|(_, family, raw)| match AddressFamily::from_raw(family) {
            Some(family) => Some(TaggedAddress { family, raw }),
            None => {
                warn!("Ignoring server with unknown address family {} on link {}", family, link);
                None
            }
        })
        .collect()
}

/// Servers of `link`, in service order
fn link_servers_of(entries: Vec<ServerEntry>, link: i32) -> Vec<ResolvedServer> {
    entries
        .into_iter()
        .filter(|(ifindex, ..)| *ifindex == link)
        .filter_map(|(_, family, raw, _port, name)| {
            let Some(family) = AddressFamily::from_raw(family) else {
                warn!("Ignoring server with unknown address family {} on link {}", family, link);
                return None;
            };
            Some(ResolvedServer {
                address: TaggedAddress { family, raw },
                name,
            })
        })
        .collect()
}

#[async_trait]
impl ResolverService for Resolved {
    async fn set_link_domains(&self, link: i32, domains: &[String]) -> Result<()> {
        bounded(SERVICE, "SetLinkDomains", self.timeout, self.domains(link, domains)).await
    }

    async fn link_domains(&self, link: i32) -> Result<Vec<String>> {
        let entries = bounded(SERVICE, "Get Domains", self.timeout, self.read_domains()).await?;
        Ok(link_domains_of(entries, link))
    }

    async fn set_link_dns(&self, link: i32, servers: &[TaggedAddress]) -> Result<()> {
        bounded(SERVICE, "SetLinkDNS", self.timeout, self.dns(link, servers)).await
    }

    async fn link_dns(&self, link: i32) -> Result<Vec<TaggedAddress>> {
        let entries = bounded(SERVICE, "Get DNS", self.timeout, self.read_dns()).await?;
        Ok(link_addresses_of(entries, link))
    }

    async fn set_link_dns_ex(&self, link: i32, servers: &[ResolvedServer]) -> Result<()> {
        bounded(SERVICE, "SetLinkDNSEx", self.timeout, self.dns_ex(link, servers)).await
    }

    async fn link_dns_ex(&self, link: i32) -> Result<Vec<ResolvedServer>> {
        let entries = bounded(SERVICE, "Get DNSEx", self.timeout, self.read_dns_ex()).await?;
        let servers = link_servers_of(entries, link);
        debug!("Link {} has {} server(s)", link, servers.len());
        Ok(servers)
    }

    async fn set_link_options(&self, link: i32, options: &ResolverOptions) -> Result<()> {
        // resolved has no per-link timeout or attempts knobs
        info!(
            "Resolver options for link {} (timeout {}s, {} attempts) are not supported by {}; not applied",
            link, options.timeout_secs, options.attempts, SERVICE
        );
        Ok(())
    }

    fn service_name(&self) -> &'static str {
        SERVICE
    }
}
