//! `dispatch` crate — invocation requests, the execution dispatcher, and the
//! instance status tracker.
//!
//! The dispatcher is the only component permitted to enqueue an invocation:
//! it allocates the instance id, records the instance as `Queued`, and
//! publishes the payload to the worker queue, rolling the record back if the
//! publish fails.

pub mod builder;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod tracker;

pub use dispatcher::Dispatcher;
pub use error::{BuildError, DispatchError, TrackerError};
pub use models::{
    ExceptionInfo, ExecutionInstance, InstanceStatus, InvocationRequest, StatusUpdate,
    TriggerReason,
};
pub use tracker::{InMemoryStatusTracker, StatusStore};
