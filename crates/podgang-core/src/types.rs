//! Read-only snapshots of the cluster objects the engine observes.
//!
//! The engine never mutates the underlying cluster objects; these are
//! copies taken at notification time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pod identity: `{namespace}/{name}`.
pub type PodKey = String;

/// Lifecycle phase of a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }
}

/// A pod as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSnapshot {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Scheduler this pod asks for (empty = any).
    #[serde(default)]
    pub scheduler_name: String,
    /// Node the pod is bound to, if any.
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub phase: PodPhase,
}

impl PodSnapshot {
    /// Create an unassigned, pending pod with no annotations.
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            annotations: HashMap::new(),
            scheduler_name: String::new(),
            node_name: None,
            phase: PodPhase::Pending,
        }
    }

    /// Builder-style annotation setter.
    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_scheduler_name(mut self, name: &str) -> Self {
        self.scheduler_name = name.to_string();
        self
    }

    /// The pod's identity key.
    pub fn key(&self) -> PodKey {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Whether this snapshot carries enough identity to be tracked.
    pub fn is_identifiable(&self) -> bool {
        !self.namespace.is_empty() && !self.name.is_empty()
    }

    /// Return a copy of this pod bound to `node`.
    pub fn assigned_to(&self, node: &str) -> Self {
        Self {
            node_name: Some(node.to_string()),
            ..self.clone()
        }
    }

    fn is_assigned(&self) -> bool {
        self.node_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// Pods that still need a node: not bound and not finished.
pub fn is_unassigned_non_terminated(pod: &PodSnapshot) -> bool {
    !pod.is_assigned() && !pod.phase.is_terminal()
}

/// Pods occupying a node: bound and not finished.
pub fn is_assigned_non_terminated(pod: &PodSnapshot) -> bool {
    pod.is_assigned() && !pod.phase.is_terminal()
}

/// A node as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    /// Ready condition is `True`.
    #[serde(default = "default_true")]
    pub ready: bool,
    /// Cordoned by an operator.
    #[serde(default)]
    pub unschedulable: bool,
    /// Maximum number of pods the node accepts.
    #[serde(default)]
    pub pod_capacity: u32,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl NodeSnapshot {
    pub fn new(name: &str, pod_capacity: u32) -> Self {
        Self {
            name: name.to_string(),
            ready: true,
            unschedulable: false,
            pod_capacity,
            labels: HashMap::new(),
        }
    }

    /// Only ready, uncordoned nodes are offered to the generic scheduler.
    pub fn is_schedulable(&self) -> bool {
        self.ready && !self.unschedulable
    }
}
