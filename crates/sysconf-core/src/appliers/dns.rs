//! DNS Resolver Applier
//!
//! Search domains and servers are always sent as the complete ordered list
//! for the link. The list itself is computed by the List Reconciler when
//! the plan is built.

use super::{ApplyFailure, SubtreeApplier};
use crate::error::{Result, ValidationError};
use crate::model::{DnsServer, LeafPath, ResolvedServer, ResolverOptions, Subtree, TaggedAddress};
use crate::pipeline::ChangePlan;
use crate::traits::ResolverService;
use crate::validate::{validate_address, validate_resolver_options, validate_search_domain};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Live resolver state of the managed link
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsResolverState {
    pub search: Vec<String>,
    pub server: Vec<DnsServer>,
}

/// Applies `system/dns-resolver` to one link
pub struct DnsResolverApplier {
    service: Arc<dyn ResolverService>,
    link: i32,
}

impl DnsResolverApplier {
    pub fn new(service: Arc<dyn ResolverService>, link: i32) -> Self {
        Self { service, link }
    }

    pub fn link(&self) -> i32 {
        self.link
    }

    /// Replace the link's search domains with `search`
    pub async fn apply_search(&self, search: &[String]) -> Result<()> {
        for domain in search {
            validate_search_domain(domain)?;
        }

        info!(
            "Setting {} search domain(s) on link {}: {:?}",
            search.len(),
            self.link,
            search
        );
        self.service.set_link_domains(self.link, search).await
    }

    /// Replace the link's servers with `servers`
    ///
    /// Records are sent through the extended interface so that their names
    /// survive. The address-only interface is used only when no record has
    /// a name at all.
    pub async fn apply_servers(&self, servers: &[DnsServer]) -> Result<()> {
        let resolved = resolve_servers(servers)?;

        info!(
            "Setting {} DNS server(s) on link {}",
            resolved.len(),
            self.link
        );

        if uses_address_only(&resolved) {
            let addresses: Vec<TaggedAddress> =
                resolved.into_iter().map(|s| s.address).collect();
            self.service.set_link_dns(self.link, &addresses).await
        } else {
            self.service.set_link_dns_ex(self.link, &resolved).await
        }
    }

    /// Pass the tuning knobs through to the resolver service
    pub async fn apply_options(&self, options: &ResolverOptions) -> Result<()> {
        validate_resolver_options(options)?;
        debug!("Setting resolver options on link {}: {:?}", self.link, options);
        self.service.set_link_options(self.link, options).await
    }

    /// Query the resolver service for the link's live state
    pub async fn read(&self) -> Result<DnsResolverState> {
        let search = self.service.link_domains(self.link).await?;
        let server = self.read_servers().await?;
        Ok(DnsResolverState { search, server })
    }

    /// Live servers of the link, with their names
    async fn read_servers(&self) -> Result<Vec<DnsServer>> {
        Ok(self
            .service
            .link_dns_ex(self.link)
            .await?
            .iter()
            .filter_map(|record| {
                let server = record.to_server();
                if server.is_none() {
                    warn!(
                        "Ignoring server record with malformed address on link {}: {:?}",
                        self.link, record
                    );
                }
                server
            })
            .collect())
    }
}

/// Whether `servers` go through the address-only interface: only when
/// there is at least one record and none of them carries a name
fn uses_address_only(servers: &[ResolvedServer]) -> bool {
    !servers.is_empty() && servers.iter().all(|s| s.name.is_empty())
}

/// Decompose every record into `{name, family, raw address}`
fn resolve_servers(servers: &[DnsServer]) -> std::result::Result<Vec<ResolvedServer>, ValidationError> {
    servers
        .iter()
        .map(|server| {
            let address = validate_address(server.address()).map_err(|e| {
                e.at(format!(
                    "{}[name='{}']/udp-and-tcp/address",
                    LeafPath::DnsServer,
                    server.name
                ))
            })?;
            Ok(ResolvedServer {
                address,
                name: server.name.clone(),
            })
        })
        .collect()
}

#[async_trait]
impl SubtreeApplier for DnsResolverApplier {
    fn subtree(&self) -> Subtree {
        Subtree::DnsResolver
    }

    fn validate_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ValidationError> {
        let desired = &plan.desired.dns_resolver;
        if plan.touches(LeafPath::DnsSearch) {
            for domain in &desired.search {
                validate_search_domain(domain)?;
            }
        }
        if plan.touches(LeafPath::DnsServer) {
            resolve_servers(&desired.server)?;
        }
        if plan.touches(LeafPath::DnsOptionsTimeout) || plan.touches(LeafPath::DnsOptionsAttempts) {
            validate_resolver_options(&desired.options)?;
        }
        Ok(())
    }

    async fn apply_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ApplyFailure> {
        let desired = &plan.desired.dns_resolver;
        // each call replaces one list on the live link
        let mut mutated = false;

        if plan.touches(LeafPath::DnsSearch) {
            self.apply_search(&desired.search)
                .await
                .map_err(|e| ApplyFailure::new(e, mutated))?;
            mutated = true;
        }
        if plan.touches(LeafPath::DnsServer) {
            self.apply_servers(&desired.server)
                .await
                .map_err(|e| ApplyFailure::new(e, mutated))?;
            mutated = true;
        }
        if plan.touches(LeafPath::DnsOptionsTimeout) || plan.touches(LeafPath::DnsOptionsAttempts) {
            self.apply_options(&desired.options)
                .await
                .map_err(|e| ApplyFailure::new(e, mutated))?;
        }
        Ok(())
    }

    async fn verify_plan(&self, plan: &ChangePlan) -> Result<Vec<String>> {
        let desired = &plan.desired.dns_resolver;
        let mut mismatches = Vec::new();

        if plan.touches(LeafPath::DnsSearch) {
            let search = self.service.link_domains(self.link).await?;
            if search != desired.search {
                mismatches.push(format!(
                    "search is {:?}, expected {:?}",
                    search, desired.search
                ));
            }
        }

        if plan.touches(LeafPath::DnsServer) {
            // compare in canonical form: "2001:DB8::1" and "2001:db8::1" are the same server
            let expected: Vec<ResolvedServer> = resolve_servers(&desired.server)?;

            if uses_address_only(&expected) {
                let live = self.service.link_dns(self.link).await?;
                let wanted: Vec<&TaggedAddress> = expected.iter().map(|s| &s.address).collect();
                if live.iter().collect::<Vec<_>>() != wanted {
                    mismatches.push(format!(
                        "server addresses are {:?}, expected {:?}",
                        live.iter().filter_map(TaggedAddress::to_ip).collect::<Vec<_>>(),
                        desired.server.iter().map(DnsServer::address).collect::<Vec<_>>()
                    ));
                }
            } else {
                let live = self.read_servers().await?;
                let actual: Vec<ResolvedServer> = resolve_servers(&live)?;
                let same = expected.len() == actual.len()
                    && expected
                        .iter()
                        .zip(&actual)
                        .all(|(e, a)| e.address == a.address && e.name == a.name);
                if !same {
                    mismatches.push(format!(
                        "servers are {:?}, expected {:?}",
                        live, desired.server
                    ));
                }
            }
        }

        Ok(mismatches)
    }
}
