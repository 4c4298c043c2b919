//! podgang-core — shared types for the PodGang gang scheduler.
//!
//! - **`types`** — read-only pod and node snapshots
//! - **`annotation`** — the scheduling-group annotation contract
//! - **`events`** — typed add/update/delete notifications
//! - **`config`** — `podgang.toml` parsing

pub mod annotation;
pub mod config;
pub mod events;
pub mod types;

pub use annotation::{DEFAULT_ROLE, GROUP_ANNOTATION, MiniGroup};
pub use config::{EngineSettings, PodGangConfig};
pub use events::{ClusterEvent, WatchEvent};
pub use types::*;
