// # Datastore Trait
//
// Defines the interface to the configuration store's running view.
//
// ## Purpose
//
// The pipeline never treats its own memory as the running configuration.
// Every batch starts from `running()`, and the desired configuration is
// handed back through `commit()` only after every touched subtree applied.
//
// ## Implementations
//
// - In-memory: `MemoryDatastore` (tests, ephemeral deployments)
// - File-based: `FileDatastore` (JSON with atomic writes and backup)

use async_trait::async_trait;

use crate::model::{LeafPath, LeafValue, SystemConfig};

/// Trait for datastore implementations
///
/// # Contract
///
/// - `running` returns the last committed configuration, or the default
///   configuration if nothing was ever committed.
/// - `commit` replaces the running configuration as a whole. A failed commit
///   leaves the previous running configuration readable.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Snapshot of the running configuration
    async fn running(&self) -> Result<SystemConfig, crate::Error>;

    /// Replace the running configuration
    async fn commit(&self, config: &SystemConfig) -> Result<(), crate::Error>;

    /// Current values of one leaf of the running configuration
    async fn leaf(&self, path: LeafPath) -> Result<Vec<LeafValue>, crate::Error> {
        Ok(self.running().await?.leaf_values(path))
    }

    /// Flush pending writes to durable storage
    async fn flush(&self) -> Result<(), crate::Error>;
}
