//! Error types for the group model.

use thiserror::Error;

/// Result type alias for group operations.
pub type GroupResult<T> = Result<T, GroupError>;

/// Errors raised when an operation names something the model does not hold.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupError {
    #[error("scheduling group not found: {0}")]
    GroupNotFound(String),

    #[error("pod {pod} is not pending in group {group}")]
    PodNotPending { group: String, pod: String },
}
