// # Local-Time Representation Traits
//
// Defines the interface to the OS mechanism that maps a symbolic zone name
// to the system's active time zone (on Linux: the `/etc/localtime` symlink
// into the zoneinfo tree), and to the zone database used for validation.

use async_trait::async_trait;

/// Zone database membership
///
/// Used by the validator. Implementations must be read-only: answering
/// `contains` never changes anything on the system.
pub trait ZoneDatabase: Send + Sync {
    /// Whether `zone` (e.g. `Europe/Berlin`) names a known zone
    fn contains(&self, zone: &str) -> bool;
}

/// Trait for local-time representation implementations
#[async_trait]
pub trait LocaltimeService: Send + Sync {
    /// Atomically repoint the local-time representation at `zone`
    ///
    /// The swap must never leave a window in which the target is missing or
    /// half-written (write a temporary entry, then rename it into place).
    /// Callers validate `zone` first; implementations may still refuse
    /// names they cannot resolve.
    async fn swap_target(&self, zone: &str) -> Result<(), crate::Error>;

    /// Resolve the current target back to a zone name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(zone))`: target maps to a known zone
    /// - `Ok(None)`: no target, or a target outside the zone database
    async fn current_zone(&self) -> Result<Option<String>, crate::Error>;
}
