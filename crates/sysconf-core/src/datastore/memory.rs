// # Memory Datastore
//
// In-memory implementation of Datastore.
//
// The running configuration is lost on restart. Used by the contract tests
// and by deployments where the configuration store replays its full running
// view on startup anyway.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::model::SystemConfig;
use crate::traits::Datastore;

/// In-memory datastore
///
/// Clones share the same running configuration.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    inner: Arc<RwLock<SystemConfig>>,
    commits: Arc<AtomicUsize>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing running configuration
    pub fn with_config(config: SystemConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            commits: Arc::default(),
        }
    }

    /// Number of successful commits so far
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn running(&self) -> Result<SystemConfig, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn commit(&self, config: &SystemConfig) -> Result<(), Error> {
        *self.inner.write().await = config.clone();
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LeafPath, LeafValue};

    #[tokio::test]
    async fn starts_from_default_configuration() {
        let store = MemoryDatastore::new();
        assert_eq!(store.running().await.unwrap(), SystemConfig::default());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn commit_replaces_running_view() {
        let store = MemoryDatastore::new();
        let config = SystemConfig {
            hostname: Some("edge-01".to_string()),
            ..Default::default()
        };

        store.commit(&config).await.unwrap();

        let shared = store.clone();
        assert_eq!(shared.running().await.unwrap(), config);
        assert_eq!(
            shared.leaf(LeafPath::Hostname).await.unwrap(),
            vec![LeafValue::Text("edge-01".to_string())]
        );
        assert_eq!(store.commit_count(), 1);
    }
}
