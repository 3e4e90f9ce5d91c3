// # Linux Platform Adapter
//
// Platform identification from uname(2) and boot time derived from the
// uptime reported by sysinfo(2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::ffi::OsStr;
use sysconf_core::model::PlatformInfo;
use sysconf_core::{Error, PlatformService, Result};

/// Platform service for Linux
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxPlatform;

impl LinuxPlatform {
    pub fn new() -> Self {
        Self
    }
}

fn lossy(s: &OsStr) -> String {
    s.to_string_lossy().into_owned()
}

#[async_trait]
impl PlatformService for LinuxPlatform {
    async fn platform(&self) -> Result<PlatformInfo> {
        let uts = nix::sys::utsname::uname()
            .map_err(|e| Error::service("kernel", format!("uname failed: {e}")))?;

        Ok(PlatformInfo {
            os_name: lossy(uts.sysname()),
            os_release: lossy(uts.release()),
            os_version: lossy(uts.version()),
            machine: lossy(uts.machine()),
        })
    }

    async fn boot_time(&self) -> Result<DateTime<Utc>> {
        let info = nix::sys::sysinfo::sysinfo()
            .map_err(|e| Error::service("kernel", format!("sysinfo failed: {e}")))?;
        let uptime = chrono::Duration::from_std(info.uptime())
            .map_err(|e| Error::service("kernel", format!("uptime out of range: {e}")))?;
        Ok(Utc::now() - uptime)
    }
}
