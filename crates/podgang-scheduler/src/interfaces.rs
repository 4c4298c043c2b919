//! Seams to the collaborators the group engine drives.
//!
//! Predicate/priority evaluation, binding RPCs, and pod status updates live
//! outside the engine. Each is a trait returning a boxed future so
//! implementations can be swapped behind `Arc<dyn ...>`.

use std::future::Future;
use std::pin::Pin;

use podgang_core::{NodeSnapshot, PodSnapshot};

use crate::error::{BindError, ScheduleError};

/// Boxed future alias for collaborator calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Picks a node for a pod (the generic predicate/priority scheduler).
pub trait GenericScheduler: Send + Sync {
    /// Return the chosen node name, or why none fits.
    fn schedule<'a>(
        &'a self,
        pod: &'a PodSnapshot,
        nodes: &'a [NodeSnapshot],
    ) -> BoxFuture<'a, Result<String, ScheduleError>>;
}

/// A pod-to-node binding request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub pod_namespace: String,
    pub pod_name: String,
    pub node_name: String,
}

impl Binding {
    pub fn new(pod: &PodSnapshot, node: &str) -> Self {
        Self {
            pod_namespace: pod.namespace.clone(),
            pod_name: pod.name.clone(),
            node_name: node.to_string(),
        }
    }

    pub fn pod_key(&self) -> String {
        format!("{}/{}", self.pod_namespace, self.pod_name)
    }
}

/// Submits bindings to the cluster.
pub trait Binder: Send + Sync {
    fn bind<'a>(&'a self, binding: &'a Binding) -> BoxFuture<'a, Result<(), BindError>>;
}

/// A pod status condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodCondition {
    pub condition_type: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

impl PodCondition {
    /// `PodScheduled=False`, reason `Unschedulable`.
    pub fn unschedulable(message: &str) -> Self {
        Self {
            condition_type: "PodScheduled".to_string(),
            status: "False".to_string(),
            reason: "Unschedulable".to_string(),
            message: message.to_string(),
        }
    }
}

/// Writes pod status conditions back to the cluster.
pub trait PodConditionUpdater: Send + Sync {
    fn update<'a>(
        &'a self,
        pod: &'a PodSnapshot,
        condition: &'a PodCondition,
    ) -> BoxFuture<'a, Result<(), String>>;
}

/// Source of the node set offered to the generic scheduler.
pub trait NodeLister: Send + Sync {
    /// Schedulable nodes only.
    fn list(&self) -> BoxFuture<'_, Vec<NodeSnapshot>>;
}
