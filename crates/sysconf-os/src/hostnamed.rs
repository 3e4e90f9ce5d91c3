// # systemd-hostnamed Adapter
//
// Sets the static hostname through `org.freedesktop.hostname1`. hostnamed
// also updates the kernel hostname when the static one changes, so the new
// name is visible to `gethostname(2)` as soon as the call returns.
//
// Reads never go through hostnamed: the kernel is the source of truth.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sysconf_core::call::bounded;
use sysconf_core::{Error, HostnameService, Result};
use tracing::debug;
use zbus::proxy;

use crate::bus::SystemBus;

const SERVICE: &str = "hostname1";

#[proxy(
    interface = "org.freedesktop.hostname1",
    default_service = "org.freedesktop.hostname1",
    default_path = "/org/freedesktop/hostname1",
    gen_blocking = false
)]
trait Hostname1 {
    /// Set the static hostname. `interactive` allows a polkit prompt.
    fn set_static_hostname(&self, hostname: &str, interactive: bool) -> zbus::Result<()>;
}

/// Hostname service backed by systemd-hostnamed
pub struct Hostnamed {
    bus: Arc<SystemBus>,
    timeout: Duration,
}

impl Hostnamed {
    pub fn new(bus: Arc<SystemBus>, timeout: Duration) -> Self {
        Self { bus, timeout }
    }

    async fn set(&self, hostname: &str) -> Result<()> {
        let conn = self.bus.connection(SERVICE).await?;
        let proxy = match Hostname1Proxy::new(&conn).await {
            Ok(proxy) => proxy,
            Err(e) => return Err(self.bus.call_failed(SERVICE, e).await),
        };

        match proxy.set_static_hostname(hostname, false).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.bus.call_failed(SERVICE, e).await),
        }
    }
}

#[async_trait]
impl HostnameService for Hostnamed {
    async fn set_static_hostname(&self, hostname: &str) -> Result<()> {
        bounded(SERVICE, "SetStaticHostname", self.timeout, self.set(hostname)).await
    }

    async fn hostname(&self) -> Result<String> {
        let name = nix::unistd::gethostname()
            .map_err(|e| Error::service("kernel", format!("gethostname failed: {e}")))?;
        let name = name
            .into_string()
            .map_err(|raw| Error::service("kernel", format!("hostname is not UTF-8: {raw:?}")))?;
        debug!("Kernel hostname is {}", name);
        Ok(name)
    }

    fn service_name(&self) -> &'static str {
        SERVICE
    }
}
