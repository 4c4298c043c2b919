//! podgang-scheduler — gang scheduling on top of the group model.
//!
//! Consumes pod and node watch notifications, keeps them in the
//! `podgang-group` model, and hands whole groups to a scheduling loop that
//! places their pods one at a time through pluggable collaborators:
//!
//! - Routes pod notifications through the unassigned-pod filter
//! - Queues groups per owning scheduler, at most once each
//! - Orders a group's pods by weighted round-robin across roles
//! - Retries failed bindings with per-pod backoff
//!
//! # Architecture
//!
//! ```text
//! GangScheduler (run loop)
//!   ├── SchedulingGroupEngine
//!   │     ├── GroupRegistry (membership, lifecycle)
//!   │     ├── GroupQueue (FIFO, ownership filter)
//!   │     └── NodeSet (node notifications)
//!   ├── DispatchOrder (weighted round-robin per group)
//!   ├── GenericScheduler / Binder / PodConditionUpdater (collaborators)
//!   └── BindRetryQueue (PodBackoff, bounded workers)
//! ```

pub mod backoff;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod nodes;
pub mod orderer;
pub mod queue;
pub mod scheduler;

pub use backoff::{BindRetryQueue, PodBackoff};
pub use engine::SchedulingGroupEngine;
pub use error::{BindError, ScheduleError, SchedulerError, SchedulerResult};
pub use interfaces::{
    Binder, Binding, BoxFuture, GenericScheduler, NodeLister, PodCondition, PodConditionUpdater,
};
pub use nodes::NodeSet;
pub use orderer::{DispatchOrder, order};
pub use queue::{GroupQueue, QueuedGroup};
pub use scheduler::{DispatchOutcome, GangScheduler};
