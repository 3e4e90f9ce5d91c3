// # sysconf-core
//
// Core library of the system configuration daemon.
//
// ## Architecture Overview
//
// The daemon keeps hostname, clock and DNS resolver settings consistent
// between a transactional configuration store and the live system:
// - **Validator**: pure checks on proposed values, before any side effect
// - **List Reconciler**: full desired lists from previous list plus edit
// - **Appliers**: one per subtree, turning desired values into service calls
// - **ChangePipeline**: validate → apply → persist → verify, once per batch
// - **StateReader**: operational view, always re-read from the services
// - **Service traits**: the only way any of the above touches the system
//
// ## Design Principles
//
// 1. **Reject before mutate**: a batch with any invalid value changes nothing
// 2. **Full lists**: resolver lists are always sent complete and ordered
// 3. **No cached truth**: reads go to the services, never to a remembered value
// 4. **Attributed failure**: a halted batch names the subtrees it already changed

pub mod appliers;
pub mod call;
pub mod config;
pub mod datastore;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod reader;
pub mod reconcile;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use appliers::{ApplyFailure, ClockApplier, DnsResolverApplier, DnsResolverState, HostnameApplier, SubtreeApplier};
pub use config::{BusConfig, DatastoreConfig, LinkConfig, LocaltimeConfig, PipelineConfig, SysconfConfig};
pub use datastore::{FileDatastore, MemoryDatastore};
pub use error::{Error, ErrorReport, Result, ValidationError, ValidationReason};
pub use model::{
    ChangeBatch, Clock, DnsServer, Edit, LeafPath, LeafValue, Operation, Subtree, SystemConfig,
};
pub use pipeline::{ChangePipeline, ChangePlan, CommitOutcome, PipelineEvent, PipelineState};
pub use reader::{ClockState, OperationalState, StateReader};
pub use traits::{
    Datastore, HostnameService, LocaltimeService, PlatformService, ResolverService, ZoneDatabase,
};
