// # Datastore Implementations
//
// Implementations of the Datastore trait for the supported persistence
// strategies, plus the factory that picks one from configuration.

pub mod file;
pub mod memory;

pub use file::FileDatastore;
pub use memory::MemoryDatastore;

use std::sync::Arc;

use crate::config::DatastoreConfig;
use crate::traits::Datastore;

/// Open the datastore described by `config`
pub async fn open(config: &DatastoreConfig) -> crate::Result<Arc<dyn Datastore>> {
    match config {
        DatastoreConfig::File { path } => {
            tracing::info!("Using file datastore at {}", path);
            Ok(Arc::new(FileDatastore::new(path).await?))
        }
        DatastoreConfig::Memory => {
            tracing::info!("Using in-memory datastore; configuration will not survive a restart");
            Ok(Arc::new(MemoryDatastore::new()))
        }
    }
}
