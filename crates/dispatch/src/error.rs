//! Dispatch-level error types.

use thiserror::Error;
use uuid::Uuid;

use crate::models::InstanceStatus;

/// Errors from [`crate::models::InvocationRequest::build`].
///
/// All of these indicate a caller/binding bug; retrying without fixing the
/// input is pointless.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The target function id was empty.
    #[error("function id must not be empty")]
    EmptyFunctionId,

    /// A bound parameter is not declared by the target function.
    #[error("function '{function_id}' declares no parameter named '{name}'")]
    UnknownParameter { function_id: String, name: String },

    /// A prerequisite was the nil identifier, which can never name a real
    /// instance.
    #[error("prerequisite instance id must not be nil")]
    NilPrerequisite,
}

/// Errors from [`crate::Dispatcher::dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The execution queue could not accept the invocation. The status
    /// record created for this dispatch has been rolled back; the caller may
    /// retry with back-off.
    #[error("execution queue unavailable: {0}")]
    QueueUnavailable(String),

    /// The status store failed while recording the instance.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// The invocation payload could not be serialized.
    #[error("failed to serialize invocation payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from the status tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The instance id is unknown. Expected during normal operation (polling
    /// before a write is visible, or a bad identifier) — not a failure to
    /// log loudly.
    #[error("no instance with id {id}")]
    NotFound { id: Uuid },

    /// A status transition outside the lifecycle state machine, or an update
    /// that raced against a newer terminal state.
    #[error("illegal status transition {from} -> {to} for instance {id}")]
    InvalidTransition {
        id: Uuid,
        from: InstanceStatus,
        to: InstanceStatus,
    },

    /// An update touched an instance already in a terminal state.
    #[error("instance {id} is terminal ({status}); no further updates allowed")]
    Terminal { id: Uuid, status: InstanceStatus },

    /// Exception details were supplied without a transition to `Failed`.
    #[error("exception details are only writable with the Failed transition (instance {id})")]
    ExceptionOutsideFailure { id: Uuid },

    /// An insert collided with an existing instance id.
    #[error("instance {id} already recorded")]
    DuplicateId { id: Uuid },

    /// The backing store itself failed (transport/storage error, distinct
    /// from `NotFound`).
    #[error("status store backend error: {0}")]
    Backend(String),
}
