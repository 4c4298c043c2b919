//! podgang-group — the in-memory scheduling group model.
//!
//! Pods that share a group annotation are tracked per group and per role
//! until they are bound. The registry is owned by the scheduling engine
//! and mutated only through the membership operations in [`tracker`].
//!
//! # Architecture
//!
//! ```text
//! GroupRegistry
//!   └── SchedulingGroup (per group id)
//!       ├── ResourceObject (per observed role)
//!       │   └── pending pods: pod key → snapshot
//!       └── SchedulerGroupState (phase + pods handed to the binder)
//! ```

pub mod error;
pub mod lifecycle;
pub mod model;
pub mod registry;
pub mod tracker;

pub use error::{GroupError, GroupResult};
pub use model::{GroupState, ResourceObject, SchedulerGroupState, SchedulingGroup};
pub use registry::GroupRegistry;
pub use tracker::{MemberRemoval, Resolved};
