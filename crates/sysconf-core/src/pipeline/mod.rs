//! Change Pipeline
//!
//! The ChangePipeline is responsible for:
//! - Folding a batch of pending edits into a desired configuration
//! - Validating every touched subtree before anything is applied
//! - Applying subtrees in a fixed order (hostname, clock, dns-resolver)
//! - Persisting the batch to the datastore only once everything applied
//! - Reading the live state back to confirm the result
//!
//! ## States
//!
//! ```text
//! Idle ──► Validating ──► Applying ──► Committed ──► Idle
//!              │              │
//!              ▼              ▼
//!          Rejected         Failed
//!              │              │
//!              └──► Idle ◄────┘
//! ```
//!
//! ## Failure Attribution
//!
//! A validation failure rejects the whole batch with no side effects. An
//! applier failure halts the batch. If any subtree was already changed on
//! the live system, the error is a [`Error::PartialApplyFailure`] naming
//! those subtrees, including the failing one when some of its own calls took
//! effect. Their effects stay in place (no compensating rollback is
//! attempted) and the datastore is not updated.
//!
//! Rejected, Failed and Committed are reported as events and then the
//! pipeline returns to Idle for the next batch.

pub mod plan;

pub use plan::ChangePlan;

use crate::appliers::{ApplyFailure, SubtreeApplier};
use crate::config::PipelineConfig;
use crate::error::{Error, Result, ValidationError};
use crate::model::{ChangeBatch, Subtree, SystemConfig};
use crate::traits::Datastore;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    /// No batch in progress
    Idle,
    /// Building the plan and validating it
    Validating,
    /// Calling appliers
    Applying,
    /// Batch applied and persisted
    Committed,
    /// Batch rejected before any side effect
    Rejected,
    /// Batch failed during apply or persist
    Failed,
}

/// Events emitted by the ChangePipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// State transition
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },

    /// A batch entered the pipeline
    BatchReceived { edits: usize },

    /// Batch rejected by validation
    Rejected { error: ValidationError },

    /// One subtree applied successfully
    SubtreeApplied { subtree: Subtree },

    /// An applier failed; `applied` subtrees were already mutated
    ApplyFailed {
        subtree: Subtree,
        applied: Vec<Subtree>,
        error: String,
    },

    /// Batch applied and persisted
    Committed { subtrees: Vec<Subtree> },

    /// Live state differs from what was just applied
    ReadbackMismatch { subtree: Subtree, detail: String },
}

/// Result of a committed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Subtrees applied, in apply order
    pub applied: Vec<Subtree>,
    /// The configuration now persisted in the datastore
    pub config: SystemConfig,
    /// Read-back differences, if verification is enabled
    pub mismatches: Vec<(Subtree, String)>,
}

/// Orchestrates validate → apply → persist → verify for each batch
///
/// ## Lifecycle
///
/// 1. Create with [`ChangePipeline::new()`]
/// 2. Call [`ChangePipeline::commit()`] once per commit event from the store
/// 3. Each call runs to completion before the next one starts
pub struct ChangePipeline {
    /// Appliers sorted by apply order
    appliers: Vec<Box<dyn SubtreeApplier>>,

    /// Store of the running configuration
    datastore: Arc<dyn Datastore>,

    /// Whether to read live state back after a commit
    verify_readback: bool,

    /// Serializes batches; holds the current state
    state: Mutex<PipelineState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<PipelineEvent>,
}

impl ChangePipeline {
    /// Create a new pipeline
    ///
    /// # Returns
    ///
    /// A tuple of (pipeline, event_receiver)
    pub fn new(
        mut appliers: Vec<Box<dyn SubtreeApplier>>,
        datastore: Arc<dyn Datastore>,
        config: &PipelineConfig,
    ) -> Result<(Self, mpsc::Receiver<PipelineEvent>)> {
        config.validate()?;

        appliers.sort_by_key(|a| a.subtree());
        if appliers.windows(2).any(|w| w[0].subtree() == w[1].subtree()) {
            return Err(Error::config("More than one applier registered for a subtree"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let pipeline = Self {
            appliers,
            datastore,
            verify_readback: config.verify_readback,
            state: Mutex::new(PipelineState::Idle),
            event_tx: tx,
        };

        Ok((pipeline, rx))
    }

    /// Current state. Waits for a running batch to finish.
    pub async fn state(&self) -> PipelineState {
        *self.state.lock().await
    }

    /// Run one batch to completion
    ///
    /// # Returns
    ///
    /// - `Ok(CommitOutcome)`: every touched subtree applied and persisted
    /// - `Err(Error::Validation)`: batch rejected; nothing changed
    /// - `Err(Error::PartialApplyFailure)`: some subtrees were applied
    /// - `Err(other)`: the first apply failed, or the datastore failed
    pub async fn commit(&self, batch: &ChangeBatch) -> Result<CommitOutcome> {
        let mut state = self.state.lock().await;

        self.emit_event(PipelineEvent::BatchReceived { edits: batch.len() });
        self.transition(&mut state, PipelineState::Validating);

        let prior = match self.datastore.running().await {
            Ok(prior) => prior,
            Err(e) => {
                error!("Failed to read running configuration: {}", e);
                self.settle(&mut state, PipelineState::Failed);
                return Err(e);
            }
        };

        let plan = match self.validate(&prior, batch) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Batch rejected: {}", e);
                self.emit_event(PipelineEvent::Rejected { error: e.clone() });
                self.settle(&mut state, PipelineState::Rejected);
                return Err(e.into());
            }
        };

        self.transition(&mut state, PipelineState::Applying);

        let applied = match self.apply(&plan).await {
            Ok(applied) => applied,
            Err(e) => {
                self.settle(&mut state, PipelineState::Failed);
                return Err(e);
            }
        };

        if let Err(e) = self.datastore.commit(&plan.desired).await {
            error!(
                "Applied [{}] but failed to persist the batch: {}",
                applied
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
                e
            );
            self.settle(&mut state, PipelineState::Failed);
            return Err(e);
        }

        info!("Batch of {} edit(s) committed", batch.len());
        self.emit_event(PipelineEvent::Committed {
            subtrees: applied.clone(),
        });
        self.transition(&mut state, PipelineState::Committed);

        let mismatches = if self.verify_readback {
            self.verify(&plan).await
        } else {
            Vec::new()
        };
        self.transition(&mut state, PipelineState::Idle);

        Ok(CommitOutcome {
            applied,
            config: plan.desired,
            mismatches,
        })
    }

    /// Build the plan and run every relevant applier's validation
    fn validate(
        &self,
        prior: &SystemConfig,
        batch: &ChangeBatch,
    ) -> std::result::Result<ChangePlan, ValidationError> {
        let plan = ChangePlan::build(prior, batch)?;

        for applier in self.touched(&plan) {
            applier.validate_plan(&plan)?;
        }

        debug!("Batch valid, touching {:?}", plan.subtrees());
        Ok(plan)
    }

    /// Apply touched subtrees in order, halting on the first failure
    async fn apply(&self, plan: &ChangePlan) -> Result<Vec<Subtree>> {
        let mut applied = Vec::new();

        for applier in self.touched(plan) {
            let subtree = applier.subtree();
            debug!("Applying {}", subtree);

            match applier.apply_plan(plan).await {
                Ok(()) => {
                    self.emit_event(PipelineEvent::SubtreeApplied { subtree });
                    applied.push(subtree);
                }
                Err(ApplyFailure { error: e, mutated }) => {
                    self.emit_event(PipelineEvent::ApplyFailed {
                        subtree,
                        applied: applied.clone(),
                        error: e.to_string(),
                    });

                    let mut changed = applied;
                    if mutated {
                        changed.push(subtree);
                    }

                    if changed.is_empty() {
                        error!("Failed to apply {}: {}", subtree, e);
                        return Err(e);
                    }

                    error!(
                        "Failed to apply {} with {:?} already changed; live system now differs from the datastore: {}",
                        subtree, changed, e
                    );
                    return Err(Error::PartialApplyFailure {
                        applied_subtrees: changed,
                        failed_subtree: subtree,
                        cause: Box::new(e),
                    });
                }
            }
        }

        Ok(applied)
    }

    /// Read touched subtrees back through the live read paths
    async fn verify(&self, plan: &ChangePlan) -> Vec<(Subtree, String)> {
        let mut mismatches = Vec::new();

        for applier in self.touched(plan) {
            let subtree = applier.subtree();
            match applier.verify_plan(plan).await {
                Ok(details) => {
                    for detail in details {
                        warn!("Read-back mismatch in {}: {}", subtree, detail);
                        self.emit_event(PipelineEvent::ReadbackMismatch {
                            subtree,
                            detail: detail.clone(),
                        });
                        mismatches.push((subtree, detail));
                    }
                }
                Err(e) => {
                    warn!("Could not read {} back: {}", subtree, e);
                    let detail = format!("read-back failed: {e}");
                    self.emit_event(PipelineEvent::ReadbackMismatch {
                        subtree,
                        detail: detail.clone(),
                    });
                    mismatches.push((subtree, detail));
                }
            }
        }

        mismatches
    }

    fn touched<'a>(
        &'a self,
        plan: &'a ChangePlan,
    ) -> impl Iterator<Item = &'a dyn SubtreeApplier> + 'a {
        self.appliers
            .iter()
            .map(|a| a.as_ref())
            .filter(move |a| plan.touches_subtree(a.subtree()))
    }

    fn transition(&self, state: &mut PipelineState, to: PipelineState) {
        let from = *state;
        *state = to;
        debug!("Pipeline {:?} -> {:?}", from, to);
        self.emit_event(PipelineEvent::StateChanged { from, to });
    }

    /// Enter a terminal state for this batch, then return to Idle
    fn settle(&self, state: &mut PipelineState, terminal: PipelineState) {
        self.transition(state, terminal);
        self.transition(state, PipelineState::Idle);
    }

    /// Emit a pipeline event, dropping it if the channel is full
    fn emit_event(&self, event: PipelineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping pipeline event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("No event receiver, dropping pipeline event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::datastore::MemoryDatastore;

    #[tokio::test]
    async fn commits_without_an_event_receiver() {
        let datastore = MemoryDatastore::new();
        let (pipeline, events) = ChangePipeline::new(
            Vec::new(),
            Arc::new(datastore.clone()),
            &PipelineConfig::default(),
        )
        .unwrap();
        drop(events);

        let outcome = pipeline.commit(&ChangeBatch::new()).await.unwrap();
        assert!(outcome.applied.is_empty());
        assert_eq!(datastore.commit_count(), 1);
        assert_eq!(pipeline.state().await, PipelineState::Idle);
    }

    #[test]
    fn events_compare_by_value() {
        let event = PipelineEvent::StateChanged {
            from: PipelineState::Idle,
            to: PipelineState::Validating,
        };
        assert_eq!(event.clone(), event);
    }
}
