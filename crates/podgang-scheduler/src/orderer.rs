//! Dispatch orderer — weighted round-robin across a group's roles.
//!
//! Roles are visited by descending priority (ties keep observation order).
//! Each visit emits up to `priority` pods from that role before moving on,
//! so higher-priority roles drain in larger bursts while every role keeps
//! making progress. Pods already handed to the binder are skipped.

use std::collections::VecDeque;

use podgang_core::PodKey;
use podgang_group::SchedulingGroup;

/// One role's remaining pods and its per-round burst size.
#[derive(Debug)]
struct Lane {
    pods: VecDeque<PodKey>,
    weight: usize,
}

/// Ordered sequence of pod keys to offer the generic scheduler.
///
/// Computed fresh from a group snapshot; consuming it does not touch the
/// group. Every eligible pending pod appears exactly once.
#[derive(Debug)]
pub struct DispatchOrder {
    lanes: Vec<Lane>,
    /// Lane currently emitting.
    lane: usize,
    /// Pods emitted by the current lane this round.
    burst: usize,
}

impl DispatchOrder {
    pub fn new(group: &SchedulingGroup) -> Self {
        let mut resources: Vec<_> = group.resources.iter().collect();
        // `sort_by` is stable: equal priorities keep observation order.
        resources.sort_by(|a, b| b.priority.cmp(&a.priority));

        let lanes = resources
            .into_iter()
            .filter_map(|ro| {
                let mut pods: Vec<PodKey> = ro
                    .pending_pods
                    .keys()
                    .filter(|key| !group.is_in_flight(key))
                    .cloned()
                    .collect();
                if pods.is_empty() {
                    return None;
                }
                pods.sort();
                Some(Lane {
                    pods: pods.into(),
                    weight: ro.weight(),
                })
            })
            .collect();

        Self {
            lanes,
            lane: 0,
            burst: 0,
        }
    }

    /// Pods not yet emitted.
    pub fn remaining(&self) -> usize {
        self.lanes.iter().map(|l| l.pods.len()).sum()
    }
}

impl Iterator for DispatchOrder {
    type Item = PodKey;

    fn next(&mut self) -> Option<PodKey> {
        loop {
            if self.lanes.is_empty() {
                return None;
            }
            if self.lane >= self.lanes.len() {
                self.lane = 0;
            }

            let lane = &mut self.lanes[self.lane];
            if self.burst < lane.weight {
                if let Some(key) = lane.pods.pop_front() {
                    self.burst += 1;
                    return Some(key);
                }
            }

            // Burst spent or lane exhausted: hand over to the next lane.
            self.burst = 0;
            if lane.pods.is_empty() {
                self.lanes.remove(self.lane);
            } else {
                self.lane += 1;
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

/// Compute the dispatch order for `group`.
pub fn order(group: &SchedulingGroup) -> DispatchOrder {
    DispatchOrder::new(group)
}
