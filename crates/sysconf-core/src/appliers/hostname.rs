//! Hostname Applier

use super::{ApplyFailure, SubtreeApplier};
use crate::error::{Result, ValidationError};
use crate::model::Subtree;
use crate::pipeline::ChangePlan;
use crate::traits::HostnameService;
use crate::validate::validate_hostname;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Applies `system/hostname`
pub struct HostnameApplier {
    service: Arc<dyn HostnameService>,
}

impl HostnameApplier {
    pub fn new(service: Arc<dyn HostnameService>) -> Self {
        Self { service }
    }

    /// Validate, then set the static hostname
    ///
    /// A validation failure returns before the service is called.
    pub async fn apply(&self, hostname: &str) -> Result<()> {
        validate_hostname(hostname)?;

        info!(
            "Setting hostname to {} via {}",
            hostname,
            self.service.service_name()
        );
        self.service.set_static_hostname(hostname).await
    }

    /// The live kernel-visible hostname
    pub async fn read(&self) -> Result<String> {
        self.service.hostname().await
    }
}

#[async_trait]
impl SubtreeApplier for HostnameApplier {
    fn subtree(&self) -> Subtree {
        Subtree::Hostname
    }

    fn validate_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ValidationError> {
        match &plan.desired.hostname {
            Some(hostname) => validate_hostname(hostname),
            None => Ok(()),
        }
    }

    async fn apply_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ApplyFailure> {
        match &plan.desired.hostname {
            Some(hostname) => Ok(self.apply(hostname).await?),
            None => {
                info!("Hostname leaf removed; live hostname left unchanged");
                Ok(())
            }
        }
    }

    async fn verify_plan(&self, plan: &ChangePlan) -> Result<Vec<String>> {
        let Some(expected) = &plan.desired.hostname else {
            return Ok(Vec::new());
        };

        let live = self.read().await?;
        debug!("Hostname read back: {}", live);
        if &live == expected {
            Ok(Vec::new())
        } else {
            Ok(vec![format!("hostname is {live:?}, expected {expected:?}")])
        }
    }
}
