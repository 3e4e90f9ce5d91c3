//! Appliers
//!
//! One applier per configuration subtree. Each turns a validated change into
//! calls against the System Service Adapter and reads the live state back.
//! The pipeline drives them through [`SubtreeApplier`] in apply order.

pub mod clock;
pub mod dns;
pub mod hostname;

pub use clock::ClockApplier;
pub use dns::{DnsResolverApplier, DnsResolverState};
pub use hostname::HostnameApplier;

use crate::error::{Error, Result, ValidationError};
use crate::model::Subtree;
use crate::pipeline::ChangePlan;
use async_trait::async_trait;

/// Pipeline-facing side of an applier
#[async_trait]
pub trait SubtreeApplier: Send + Sync {
    /// The subtree this applier owns
    fn subtree(&self) -> Subtree;

    /// Check the desired values of this subtree. Must not call any service
    /// that mutates state.
    fn validate_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ValidationError>;

    /// Apply the desired values of this subtree
    async fn apply_plan(&self, plan: &ChangePlan) -> std::result::Result<(), ApplyFailure>;

    /// Read the live state back and describe every difference from the
    /// desired values. An empty list means the live system matches.
    async fn verify_plan(&self, plan: &ChangePlan) -> Result<Vec<String>>;
}

/// A failed apply, and whether the live subtree was already changed by it
#[derive(Debug)]
pub struct ApplyFailure {
    pub error: Error,
    /// At least one service call of this subtree succeeded before `error`
    pub mutated: bool,
}

impl ApplyFailure {
    pub fn new(error: Error, mutated: bool) -> Self {
        Self { error, mutated }
    }
}

impl From<Error> for ApplyFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            mutated: false,
        }
    }
}
