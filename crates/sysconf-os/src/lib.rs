// # sysconf-os
//
// Service adapters that connect the sysconf daemon to a Linux system:
//
// - **SystemBus**: the shared D-Bus system bus connection
// - **Hostnamed**: hostname via systemd-hostnamed, read from the kernel
// - **Resolved**: per-link resolver settings via systemd-resolved
// - **SymlinkLocaltime** / **ZoneinfoDatabase**: `/etc/localtime` and the zone database
// - **LinuxPlatform**: uname(2) and sysinfo(2)
//
// ## Platform Support
//
// The D-Bus and kernel adapters only build on Linux. The local-time adapter
// builds on any Unix.

#[cfg(target_os = "linux")]
pub mod bus;
#[cfg(target_os = "linux")]
pub mod hostnamed;
#[cfg(unix)]
pub mod localtime;
#[cfg(target_os = "linux")]
pub mod platform;
#[cfg(target_os = "linux")]
pub mod resolved;

#[cfg(target_os = "linux")]
pub use bus::SystemBus;
#[cfg(target_os = "linux")]
pub use hostnamed::Hostnamed;
#[cfg(unix)]
pub use localtime::{SymlinkLocaltime, ZoneinfoDatabase};
#[cfg(target_os = "linux")]
pub use platform::LinuxPlatform;
#[cfg(target_os = "linux")]
pub use resolved::Resolved;

#[cfg(target_os = "linux")]
use std::sync::Arc;

/// Every adapter the daemon needs, sharing one bus connection
#[cfg(target_os = "linux")]
pub struct SystemServices {
    pub bus: Arc<SystemBus>,
    pub hostname: Arc<Hostnamed>,
    pub resolver: Arc<Resolved>,
    pub localtime: Arc<SymlinkLocaltime>,
    pub zones: Arc<ZoneinfoDatabase>,
    pub platform: Arc<LinuxPlatform>,
}

#[cfg(target_os = "linux")]
impl SystemServices {
    /// Build the adapters. Nothing is connected until the first call.
    pub fn new(config: &sysconf_core::SysconfConfig) -> Self {
        let bus = SystemBus::new(&config.bus);
        let timeout = config.pipeline.call_timeout();
        let zones = ZoneinfoDatabase::new(&config.localtime.zoneinfo_dir);

        Self {
            hostname: Arc::new(Hostnamed::new(bus.clone(), timeout)),
            resolver: Arc::new(Resolved::new(bus.clone(), timeout)),
            localtime: Arc::new(SymlinkLocaltime::new(&config.localtime.path, zones.clone())),
            zones: Arc::new(zones),
            platform: Arc::new(LinuxPlatform::new()),
            bus,
        }
    }
}
