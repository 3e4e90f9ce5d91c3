// # Hostname Service Trait
//
// Defines the interface to the system's hostname service.
//
// ## Implementations
//
// - systemd-hostnamed over D-Bus: `sysconf-os` crate
//
// ## Usage
//
// ```rust,ignore
// use sysconf_core::HostnameService;
//
// async fn rename(service: &dyn HostnameService) -> sysconf_core::Result<()> {
//     service.set_static_hostname("edge-01.example.net").await?;
//     assert_eq!(service.hostname().await?, "edge-01.example.net");
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for hostname service implementations
///
/// # Contract
///
/// - `set_static_hostname` issues exactly one call to the service. It does
///   not retry; a retry of a non-idempotent mutation is the caller's call.
/// - `hostname` always asks the kernel. It never answers from a value the
///   implementation remembered from an earlier `set_static_hostname`.
#[async_trait]
pub trait HostnameService: Send + Sync {
    /// Set the static hostname. The kernel-visible hostname changes
    /// immediately on success.
    ///
    /// # Errors
    ///
    /// - `ServiceUnavailable`: the service could not be reached
    /// - `PermissionDenied`: the service refused the caller
    /// - `Timeout`: no answer within the call bound; outcome unknown
    async fn set_static_hostname(&self, hostname: &str) -> Result<(), crate::Error>;

    /// Read the current kernel-visible hostname
    async fn hostname(&self) -> Result<String, crate::Error>;

    /// Service name (for logging and error attribution)
    fn service_name(&self) -> &'static str;
}
