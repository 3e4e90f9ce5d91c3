//! State Reader
//!
//! Assembles the operational view of the `system` subtree by asking the
//! services directly on every read. Nothing here consults the datastore or
//! remembers a previous read, so out-of-band changes (another process
//! replacing the local-time link, say) show up on the next query.

use crate::appliers::{DnsResolverApplier, DnsResolverState};
use crate::error::Result;
use crate::model::PlatformInfo;
use crate::traits::{HostnameService, LocaltimeService, PlatformService, ResolverService};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Live state of the managed system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct OperationalState {
    pub platform: PlatformInfo,
    pub clock: ClockState,
    pub hostname: String,
    pub dns_resolver: DnsResolverState,
}

/// Live clock state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClockState {
    /// Zone the local-time representation currently resolves to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_name: Option<String>,
    pub current_datetime: DateTime<Utc>,
    pub boot_datetime: DateTime<Utc>,
}

/// Reads operational state straight from the services
pub struct StateReader {
    hostname: Arc<dyn HostnameService>,
    localtime: Arc<dyn LocaltimeService>,
    platform: Arc<dyn PlatformService>,
    resolver: DnsResolverApplier,
}

impl StateReader {
    pub fn new(
        hostname: Arc<dyn HostnameService>,
        localtime: Arc<dyn LocaltimeService>,
        platform: Arc<dyn PlatformService>,
        resolver: Arc<dyn ResolverService>,
        link: i32,
    ) -> Self {
        Self {
            hostname,
            localtime,
            platform,
            resolver: DnsResolverApplier::new(resolver, link),
        }
    }

    /// Full operational view
    pub async fn read(&self) -> Result<OperationalState> {
        Ok(OperationalState {
            platform: self.platform.platform().await?,
            clock: self.clock().await?,
            hostname: self.hostname.hostname().await?,
            dns_resolver: self.resolver.read().await?,
        })
    }

    pub async fn clock(&self) -> Result<ClockState> {
        Ok(ClockState {
            timezone_name: self.localtime.current_zone().await?,
            current_datetime: Utc::now(),
            boot_datetime: self.platform.boot_time().await?,
        })
    }

    pub async fn hostname(&self) -> Result<String> {
        self.hostname.hostname().await
    }

    pub async fn dns_resolver(&self) -> Result<DnsResolverState> {
        self.resolver.read().await
    }
}
