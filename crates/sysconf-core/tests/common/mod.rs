//! Test doubles and common utilities for contract tests
//!
//! Every double records the calls it receives and keeps its "live" state
//! behind an `Arc`, so a test can hand one to the pipeline and still inspect
//! it afterwards. Failures are injected per double with [`Failure`].

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use sysconf_core::appliers::{ClockApplier, DnsResolverApplier, HostnameApplier, SubtreeApplier};
use sysconf_core::error::{Error, Result};
use sysconf_core::model::{PlatformInfo, ResolvedServer, ResolverOptions, TaggedAddress};
use sysconf_core::traits::{
    HostnameService, LocaltimeService, PlatformService, ResolverService, ZoneDatabase,
};
use sysconf_core::{
    ChangePipeline, MemoryDatastore, PipelineConfig, PipelineEvent, StateReader,
};
use tokio::sync::mpsc;

/// Link index used by every resolver test
pub const LINK: i32 = 2;

/// Failure to inject into the next calls of a double
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Unavailable,
    PermissionDenied,
    Timeout,
}

impl Failure {
    fn to_error(self, service: &str, operation: &str) -> Error {
        match self {
            Failure::Unavailable => Error::service_unavailable(service),
            Failure::PermissionDenied => Error::permission_denied(service),
            Failure::Timeout => Error::timeout(service, operation),
        }
    }
}

/// A hostname service that records every mutation
#[derive(Default)]
pub struct RecordingHostname {
    live: Mutex<String>,
    set_calls: AtomicUsize,
    failure: Mutex<Option<Failure>>,
}

impl RecordingHostname {
    pub fn new(initial: &str) -> Arc<Self> {
        Arc::new(Self {
            live: Mutex::new(initial.to_string()),
            ..Default::default()
        })
    }

    /// Number of `set_static_hostname` calls
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> String {
        self.live.lock().unwrap().clone()
    }

    /// Change the hostname behind the daemon's back
    pub fn set_out_of_band(&self, hostname: &str) {
        *self.live.lock().unwrap() = hostname.to_string();
    }

    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock().unwrap() = Some(failure);
    }
}

#[async_trait::async_trait]
impl HostnameService for RecordingHostname {
    async fn set_static_hostname(&self, hostname: &str) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.failure.lock().unwrap() {
            return Err(failure.to_error(self.service_name(), "SetStaticHostname"));
        }
        *self.live.lock().unwrap() = hostname.to_string();
        Ok(())
    }

    async fn hostname(&self) -> Result<String> {
        Ok(self.live())
    }

    fn service_name(&self) -> &'static str {
        "fake-hostnamed"
    }
}

/// A local-time representation held in memory
#[derive(Default)]
pub struct RecordingLocaltime {
    target: Mutex<Option<String>>,
    swaps: Mutex<Vec<String>>,
    failure: Mutex<Option<Failure>>,
}

impl RecordingLocaltime {
    pub fn new(initial: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            target: Mutex::new(initial.map(str::to_string)),
            ..Default::default()
        })
    }

    pub fn target(&self) -> Option<String> {
        self.target.lock().unwrap().clone()
    }

    /// Zones swapped in, in call order
    pub fn swaps(&self) -> Vec<String> {
        self.swaps.lock().unwrap().clone()
    }

    pub fn set_out_of_band(&self, zone: &str) {
        *self.target.lock().unwrap() = Some(zone.to_string());
    }

    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock().unwrap() = Some(failure);
    }
}

#[async_trait::async_trait]
impl LocaltimeService for RecordingLocaltime {
    async fn swap_target(&self, zone: &str) -> Result<()> {
        self.swaps.lock().unwrap().push(zone.to_string());
        if let Some(failure) = *self.failure.lock().unwrap() {
            return Err(failure.to_error("localtime", "swap"));
        }
        *self.target.lock().unwrap() = Some(zone.to_string());
        Ok(())
    }

    async fn current_zone(&self) -> Result<Option<String>> {
        Ok(self.target())
    }
}

/// A fixed zone database
pub struct StaticZones(HashSet<String>);

impl StaticZones {
    pub fn new(zones: &[&str]) -> Arc<Self> {
        Arc::new(Self(zones.iter().map(|z| z.to_string()).collect()))
    }

    /// A handful of real zones plus the whole-hour `Etc` zones
    pub fn standard() -> Arc<Self> {
        let mut zones: HashSet<String> = [
            "Etc/UTC",
            "Europe/Berlin",
            "Europe/London",
            "America/New_York",
            "Asia/Tokyo",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        for h in 1..=12 {
            zones.insert(format!("Etc/GMT+{h}"));
        }
        for h in 1..=14 {
            zones.insert(format!("Etc/GMT-{h}"));
        }
        Arc::new(Self(zones))
    }
}

impl ZoneDatabase for StaticZones {
    fn contains(&self, zone: &str) -> bool {
        self.0.contains(zone)
    }
}

/// One mutating call received by [`RecordingResolver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverCall {
    SetDomains(i32, Vec<String>),
    SetDns(i32, Vec<TaggedAddress>),
    SetDnsEx(i32, Vec<ResolvedServer>),
    SetOptions(i32, ResolverOptions),
}

/// A per-link resolver service held in memory
#[derive(Default)]
pub struct RecordingResolver {
    domains: Mutex<Vec<String>>,
    servers: Mutex<Vec<ResolvedServer>>,
    calls: Mutex<Vec<ResolverCall>>,
    failure: Mutex<Option<Failure>>,
    failing_operation: Mutex<Option<(&'static str, Failure)>>,
    address_reads: AtomicUsize,
}

impl RecordingResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<ResolverCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn domains(&self) -> Vec<String> {
        self.domains.lock().unwrap().clone()
    }

    pub fn servers(&self) -> Vec<ResolvedServer> {
        self.servers.lock().unwrap().clone()
    }

    /// Seed the live server list directly
    pub fn set_servers(&self, servers: Vec<ResolvedServer>) {
        *self.servers.lock().unwrap() = servers;
    }

    pub fn fail_with(&self, failure: Failure) {
        *self.failure.lock().unwrap() = Some(failure);
    }

    /// Fail only `operation` (e.g. `"SetLinkDNSEx"`); other calls succeed
    pub fn fail_on(&self, operation: &'static str, failure: Failure) {
        *self.failing_operation.lock().unwrap() = Some((operation, failure));
    }

    /// Number of reads through the address-only interface
    pub fn address_reads(&self) -> usize {
        self.address_reads.load(Ordering::SeqCst)
    }

    /// Options passed by `set_link_options` calls, in call order
    pub fn options(&self) -> Vec<ResolverOptions> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ResolverCall::SetOptions(_, options) => Some(options),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ResolverCall, operation: &str) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if let Some((failing, failure)) = *self.failing_operation.lock().unwrap() {
            if failing == operation {
                return Err(failure.to_error(self.service_name(), operation));
            }
        }
        match *self.failure.lock().unwrap() {
            Some(failure) => Err(failure.to_error(self.service_name(), operation)),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ResolverService for RecordingResolver {
    async fn set_link_domains(&self, link: i32, domains: &[String]) -> Result<()> {
        self.record(ResolverCall::SetDomains(link, domains.to_vec()), "SetLinkDomains")?;
        *self.domains.lock().unwrap() = domains.to_vec();
        Ok(())
    }

    async fn link_domains(&self, _link: i32) -> Result<Vec<String>> {
        Ok(self.domains())
    }

    async fn set_link_dns(&self, link: i32, servers: &[TaggedAddress]) -> Result<()> {
        self.record(ResolverCall::SetDns(link, servers.to_vec()), "SetLinkDNS")?;
        *self.servers.lock().unwrap() = servers
            .iter()
            .map(|address| ResolvedServer {
                address: address.clone(),
                name: String::new(),
            })
            .collect();
        Ok(())
    }

    async fn link_dns(&self, _link: i32) -> Result<Vec<TaggedAddress>> {
        self.address_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.servers().into_iter().map(|s| s.address).collect())
    }

    async fn set_link_dns_ex(&self, link: i32, servers: &[ResolvedServer]) -> Result<()> {
        self.record(ResolverCall::SetDnsEx(link, servers.to_vec()), "SetLinkDNSEx")?;
        *self.servers.lock().unwrap() = servers.to_vec();
        Ok(())
    }

    async fn link_dns_ex(&self, _link: i32) -> Result<Vec<ResolvedServer>> {
        Ok(self.servers())
    }

    async fn set_link_options(&self, link: i32, options: &ResolverOptions) -> Result<()> {
        self.record(ResolverCall::SetOptions(link, *options), "SetLinkOptions")
    }

    fn service_name(&self) -> &'static str {
        "fake-resolved"
    }
}

/// Fixed platform identification
pub struct FixedPlatform {
    pub boot: DateTime<Utc>,
}

impl FixedPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            boot: Utc.with_ymd_and_hms(2026, 1, 9, 12, 0, 0).unwrap(),
        })
    }
}

#[async_trait::async_trait]
impl PlatformService for FixedPlatform {
    async fn platform(&self) -> Result<PlatformInfo> {
        Ok(PlatformInfo {
            os_name: "Linux".to_string(),
            os_release: "6.1.0".to_string(),
            os_version: "#1 SMP".to_string(),
            machine: "x86_64".to_string(),
        })
    }

    async fn boot_time(&self) -> Result<DateTime<Utc>> {
        Ok(self.boot)
    }
}

/// All doubles of one simulated system
pub struct Fakes {
    pub hostname: Arc<RecordingHostname>,
    pub localtime: Arc<RecordingLocaltime>,
    pub zones: Arc<StaticZones>,
    pub resolver: Arc<RecordingResolver>,
    pub platform: Arc<FixedPlatform>,
    pub datastore: MemoryDatastore,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            hostname: RecordingHostname::new("localhost"),
            localtime: RecordingLocaltime::new(Some("Etc/UTC")),
            zones: StaticZones::standard(),
            resolver: RecordingResolver::new(),
            platform: FixedPlatform::new(),
            datastore: MemoryDatastore::new(),
        }
    }

    pub fn appliers(&self) -> Vec<Box<dyn SubtreeApplier>> {
        vec![
            Box::new(DnsResolverApplier::new(self.resolver.clone(), LINK)),
            Box::new(HostnameApplier::new(self.hostname.clone())),
            Box::new(ClockApplier::new(self.localtime.clone(), self.zones.clone())),
        ]
    }

    pub fn pipeline(&self) -> (ChangePipeline, mpsc::Receiver<PipelineEvent>) {
        ChangePipeline::new(
            self.appliers(),
            Arc::new(self.datastore.clone()),
            &PipelineConfig::default(),
        )
        .expect("pipeline construction succeeds")
    }

    pub fn reader(&self) -> StateReader {
        StateReader::new(
            self.hostname.clone(),
            self.localtime.clone(),
            self.platform.clone(),
            self.resolver.clone(),
            LINK,
        )
    }

    /// Total number of mutating calls across every service
    pub fn mutations(&self) -> usize {
        self.hostname.set_calls() + self.localtime.swaps().len() + self.resolver.calls().len()
    }
}

/// Drain every event emitted so far
pub fn drain(rx: &mut mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
