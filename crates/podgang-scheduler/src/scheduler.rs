//! Gang scheduler — the loop that drives groups through the generic
//! scheduler and the binder.
//!
//! The `GangScheduler` repeatedly:
//! - Takes the next group this instance owns from the engine
//! - Pushes it back if not every declared role has been observed yet
//! - Offers its pods in dispatch order to the generic scheduler
//! - Binds placed pods, retrying failed bindings with backoff
//! - Pushes the group back when some pods found no node

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use podgang_core::PodSnapshot;

use crate::backoff::BindRetryQueue;
use crate::engine::SchedulingGroupEngine;
use crate::error::{ScheduleError, SchedulerResult};
use crate::interfaces::{Binder, Binding, GenericScheduler, NodeLister, PodCondition, PodConditionUpdater};

/// Result of one dispatch pass over a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Pods handed to the generic scheduler.
    pub attempted: usize,
    /// Pods whose binding went through.
    pub bound: usize,
    /// Pods no node could take.
    pub unschedulable: usize,
    /// Pods placed but not bound; queued for retry.
    pub bind_failures: usize,
}

impl DispatchOutcome {
    /// Whether the group should be pushed back with a cooldown.
    pub fn needs_push_back(&self) -> bool {
        self.unschedulable > 0
    }
}

/// Drives scheduling groups from the engine to the cluster.
pub struct GangScheduler {
    engine: Arc<SchedulingGroupEngine>,
    algorithm: Arc<dyn GenericScheduler>,
    binder: Arc<dyn Binder>,
    conditions: Option<Arc<dyn PodConditionUpdater>>,
    nodes: Arc<dyn NodeLister>,
    retries: BindRetryQueue,
}

impl GangScheduler {
    /// Create a scheduler offering the engine's own node set.
    pub fn new(
        engine: Arc<SchedulingGroupEngine>,
        algorithm: Arc<dyn GenericScheduler>,
        binder: Arc<dyn Binder>,
    ) -> Self {
        let nodes: Arc<dyn NodeLister> = engine.nodes();
        let retries = BindRetryQueue::new(Arc::clone(&engine));
        Self {
            engine,
            algorithm,
            binder,
            conditions: None,
            nodes,
            retries,
        }
    }

    /// Report unschedulable pods through `updater`.
    pub fn with_condition_updater(mut self, updater: Arc<dyn PodConditionUpdater>) -> Self {
        self.conditions = Some(updater);
        self
    }

    /// Offer nodes from `lister` instead of the engine's node set.
    pub fn with_node_lister(mut self, lister: Arc<dyn NodeLister>) -> Self {
        self.nodes = lister;
        self
    }

    pub fn engine(&self) -> &Arc<SchedulingGroupEngine> {
        &self.engine
    }

    pub fn retries(&self) -> &BindRetryQueue {
        &self.retries
    }

    /// Run until `shutdown` flips to `true` (or its sender goes away).
    ///
    /// On shutdown the engine's queue is closed. A pass already in progress
    /// runs to completion first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(scheduler = %self.engine.scheduler_name(), "gang scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let group = tokio::select! {
                next = self.engine.next_scheduling_group() => match next {
                    Some(group) => group,
                    None => break,
                },
                _ = shutdown.changed() => {
                    debug!("scheduling loop shutting down");
                    break;
                }
            };
            let group_id = group.group_id.clone();

            if !group.is_ready() {
                debug!(
                    group = %group_id,
                    observed = group.resources.len(),
                    declared = group.resource_count,
                    "not all roles observed yet, pushing back"
                );
                self.engine.push_back_scheduling_group(&group_id).await;
                continue;
            }

            match self.schedule_group_once(&group_id).await {
                Ok(outcome) if outcome.needs_push_back() => {
                    info!(
                        group = %group_id,
                        bound = outcome.bound,
                        unschedulable = outcome.unschedulable,
                        "group partially scheduled, pushing back"
                    );
                    self.engine.push_back_scheduling_group(&group_id).await;
                }
                Ok(outcome) => {
                    debug!(
                        group = %group_id,
                        attempted = outcome.attempted,
                        bound = outcome.bound,
                        bind_failures = outcome.bind_failures,
                        "dispatch pass finished"
                    );
                }
                Err(e) => error!(group = %group_id, error = %e, "dispatch pass failed"),
            }
        }

        self.engine.shutdown().await;
        info!("gang scheduler stopped");
    }

    /// One dispatch pass over `group_id`'s eligible pods.
    pub async fn schedule_group_once(&self, group_id: &str) -> SchedulerResult<DispatchOutcome> {
        let mut outcome = DispatchOutcome::default();

        let keys = self.engine.order(group_id).await?;
        if keys.is_empty() {
            debug!(group = %group_id, "nothing to dispatch, all pods in flight");
            return Ok(outcome);
        }

        for key in keys {
            let pod = match self.engine.mark_in_flight(group_id, &key).await {
                Ok(pod) => pod,
                Err(e) => {
                    debug!(group = %group_id, pod = %key, reason = %e, "skipping pod");
                    continue;
                }
            };
            outcome.attempted += 1;

            let nodes = self.nodes.list().await;
            let node = match self.algorithm.schedule(&pod, &nodes).await {
                Ok(node) => node,
                Err(e) => {
                    outcome.unschedulable += 1;
                    self.on_unschedulable(group_id, &pod, &e).await;
                    continue;
                }
            };

            let binding = Binding::new(&pod, &node);
            match self.binder.bind(&binding).await {
                Ok(()) => {
                    outcome.bound += 1;
                    self.retries.reset(&key).await;
                    debug!(group = %group_id, pod = %key, %node, "pod bound");
                }
                Err(e) => {
                    outcome.bind_failures += 1;
                    error!(group = %group_id, pod = %key, error = %e, "binding rejected");
                    if !self.retries.submit(group_id, &key).await {
                        // A retry is already pending; make the pod eligible
                        // now rather than leave it in flight.
                        self.engine.retry_pod(group_id, &key).await;
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn on_unschedulable(&self, group_id: &str, pod: &PodSnapshot, reason: &ScheduleError) {
        let key = pod.key();
        warn!(group = %group_id, pod = %key, %reason, "pod unschedulable");

        if let Err(e) = self.engine.settle(group_id, &key).await {
            error!(group = %group_id, pod = %key, error = %e, "failed to settle pod");
        }

        if let Some(updater) = &self.conditions {
            let condition = PodCondition::unschedulable(&reason.to_string());
            if let Err(e) = updater.update(pod, &condition).await {
                error!(pod = %key, error = %e, "failed to update pod condition");
            }
        }
    }
}
