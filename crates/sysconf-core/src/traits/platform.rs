// # Platform Service Trait
//
// Read-only platform facts reported as operational state.

use crate::model::PlatformInfo;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for platform information sources
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// OS name, release, version and machine
    async fn platform(&self) -> Result<PlatformInfo, crate::Error>;

    /// Time the system booted (current time minus uptime)
    async fn boot_time(&self) -> Result<DateTime<Utc>, crate::Error>;
}
