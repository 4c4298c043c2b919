//! Scheduler error types.

use thiserror::Error;

use podgang_group::GroupError;

/// Why the generic scheduler could not place a pod.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("no nodes available to schedule pods")]
    NoNodesAvailable,

    #[error("pod {pod} does not fit on any node: {reason}")]
    NoFit { pod: String, reason: String },

    #[error("scheduling algorithm error: {0}")]
    Internal(String),
}

/// A binding RPC that did not go through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("binding {pod} to {node} failed: {reason}")]
pub struct BindError {
    pub pod: String,
    pub node: String,
    pub reason: String,
}

/// Errors that can occur during scheduling operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("group error: {0}")]
    Group(#[from] GroupError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
