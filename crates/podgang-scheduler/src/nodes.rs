//! Node set maintained from node watch events.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use podgang_core::{NodeSnapshot, WatchEvent};

use crate::interfaces::{BoxFuture, NodeLister};

/// Known nodes keyed by name.
#[derive(Debug, Default)]
pub struct NodeSet {
    nodes: RwLock<HashMap<String, NodeSnapshot>>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a node notification.
    pub async fn apply(&self, event: WatchEvent<NodeSnapshot>) {
        let mut nodes = self.nodes.write().await;
        match event {
            WatchEvent::Added { object } => {
                debug!(node = %object.name, "node added");
                nodes.insert(object.name.clone(), object);
            }
            WatchEvent::Updated { old, new } => {
                if old.name != new.name {
                    nodes.remove(&old.name);
                }
                nodes.insert(new.name.clone(), new);
            }
            WatchEvent::Deleted { object } => {
                debug!(node = %object.name, "node deleted");
                nodes.remove(&object.name);
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<NodeSnapshot> {
        self.nodes.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ready, uncordoned nodes sorted by name.
    pub async fn schedulable(&self) -> Vec<NodeSnapshot> {
        let nodes = self.nodes.read().await;
        let mut out: Vec<NodeSnapshot> = nodes
            .values()
            .filter(|n| n.is_schedulable())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

impl NodeLister for NodeSet {
    fn list(&self) -> BoxFuture<'_, Vec<NodeSnapshot>> {
        Box::pin(self.schedulable())
    }
}
