//! System Service Adapter interfaces
//!
//! These traits are the only way the daemon touches the live system.
//! Implementations are thin: they wrap one external call each, translate
//! errors into [`crate::Error`] and bound every call with a timeout.
//!
//! - [`HostnameService`]: set and read the hostname
//! - [`LocaltimeService`] / [`ZoneDatabase`]: local-time representation
//! - [`ResolverService`]: per-link resolver configuration
//! - [`PlatformService`]: platform identification and boot time
//! - [`Datastore`]: the configuration store's running view

pub mod datastore;
pub mod hostname;
pub mod localtime;
pub mod platform;
pub mod resolver;

pub use datastore::Datastore;
pub use hostname::HostnameService;
pub use localtime::{LocaltimeService, ZoneDatabase};
pub use platform::PlatformService;
pub use resolver::ResolverService;
