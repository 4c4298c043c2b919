//! Typed watch notifications.
//!
//! Each entity kind gets its own variant so consumers dispatch with a
//! `match` instead of inspecting payload types at runtime. The serde
//! layout doubles as the JSON-lines feed format:
//!
//! ```json
//! {"kind":"pod","type":"added","object":{"namespace":"ns","name":"a"}}
//! {"kind":"node","type":"deleted","object":{"name":"n1"}}
//! {"kind":"pod","type":"updated","old":{...},"new":{...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{NodeSnapshot, PodSnapshot};

/// A single add/update/delete notification with before/after snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent<T> {
    Added { object: T },
    Updated { old: T, new: T },
    Deleted { object: T },
}

impl<T> WatchEvent<T> {
    /// The most recent snapshot carried by the event.
    pub fn latest(&self) -> &T {
        match self {
            WatchEvent::Added { object } | WatchEvent::Deleted { object } => object,
            WatchEvent::Updated { new, .. } => new,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            WatchEvent::Added { .. } => "added",
            WatchEvent::Updated { .. } => "updated",
            WatchEvent::Deleted { .. } => "deleted",
        }
    }
}

/// A notification from the cluster event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterEvent {
    Pod(WatchEvent<PodSnapshot>),
    Node(WatchEvent<NodeSnapshot>),
}

impl ClusterEvent {
    pub fn pod_added(pod: PodSnapshot) -> Self {
        ClusterEvent::Pod(WatchEvent::Added { object: pod })
    }

    pub fn pod_updated(old: PodSnapshot, new: PodSnapshot) -> Self {
        ClusterEvent::Pod(WatchEvent::Updated { old, new })
    }

    pub fn pod_deleted(pod: PodSnapshot) -> Self {
        ClusterEvent::Pod(WatchEvent::Deleted { object: pod })
    }

    pub fn node_added(node: NodeSnapshot) -> Self {
        ClusterEvent::Node(WatchEvent::Added { object: node })
    }

    pub fn node_deleted(node: NodeSnapshot) -> Self {
        ClusterEvent::Node(WatchEvent::Deleted { object: node })
    }
}
