//! Clock Applier
//!
//! Only one side of the clock choice is ever authoritative. Both sides end
//! up as a zone for the local-time representation: a zone name directly, a
//! whole-hour UTC offset through its `Etc/GMT` zone.

use super::{ApplyFailure, SubtreeApplier};
use crate::error::{Result, ValidationError};
use crate::model::{Clock, Subtree};
use crate::pipeline::ChangePlan;
use crate::traits::{LocaltimeService, ZoneDatabase};
use crate::validate::{validate_timezone_name, validate_utc_offset};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Zone the local time falls back to when the clock choice is removed
pub const DEFAULT_ZONE: &str = "Etc/UTC";

/// Applies `system/clock`
pub struct ClockApplier {
    localtime: Arc<dyn LocaltimeService>,
    zones: Arc<dyn ZoneDatabase>,
}

impl ClockApplier {
    pub fn new(localtime: Arc<dyn LocaltimeService>, zones: Arc<dyn ZoneDatabase>) -> Self {
        Self { localtime, zones }
    }

    /// Repoint local time at `zone`
    ///
    /// An unknown zone fails with `UnknownTimezone` and leaves the
    /// local-time representation untouched.
    pub async fn apply(&self, zone: &str) -> Result<()> {
        validate_timezone_name(zone, self.zones.as_ref())?;
        self.swap(zone).await
    }

    /// Apply either side of the clock choice
    pub async fn apply_clock(&self, clock: &Clock) -> Result<()> {
        let zone = self.zone_for(clock)?;
        self.swap(&zone).await
    }

    /// Reset local time to [`DEFAULT_ZONE`]
    pub async fn reset(&self) -> Result<()> {
        self.apply(DEFAULT_ZONE).await
    }

    /// The zone the live local-time representation resolves to, if any
    pub async fn read(&self) -> Result<Option<String>> {
        self.localtime.current_zone().await
    }

    fn zone_for(&self, clock: &Clock) -> std::result::Result<String, ValidationError> {
        match clock {
            Clock::TimezoneName(name) => {
                validate_timezone_name(name, self.zones.as_ref())?;
                Ok(name.clone())
            }
            Clock::TimezoneUtcOffset(minutes) => {
                validate_utc_offset(i64::from(*minutes), self.zones.as_ref())
            }
        }
    }

    async fn swap(&self, zone: &str) -> Result<()> {
        info!("Pointing local time at {}", zone);
        self.localtime.swap_target(zone).await
    }
}

#[async_trait]
impl SubtreeApplier for ClockApplier {
    fn subtree(&self) -> Subtree {
        Subtree::Clock
    }

    fn validate_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ValidationError> {
        match &plan.desired.clock {
            Some(clock) => self.zone_for(clock).map(|_| ()),
            // removal repoints local time, so the fallback zone must exist too
            None => validate_timezone_name(DEFAULT_ZONE, self.zones.as_ref()),
        }
    }

    async fn apply_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ApplyFailure> {
        match &plan.desired.clock {
            Some(clock) => Ok(self.apply_clock(clock).await?),
            None => {
                info!("Clock choice removed; resetting local time");
                Ok(self.reset().await?)
            }
        }
    }

    async fn verify_plan(&self, plan: &ChangePlan) -> Result<Vec<String>> {
        let expected = match &plan.desired.clock {
            Some(clock) => self.zone_for(clock)?,
            None => DEFAULT_ZONE.to_string(),
        };

        let live = self.read().await?;
        debug!("Local time read back: {:?}", live);
        if live.as_deref() == Some(expected.as_str()) {
            Ok(Vec::new())
        } else {
            Ok(vec![format!("local time resolves to {live:?}, expected {expected:?}")])
        }
    }
}
