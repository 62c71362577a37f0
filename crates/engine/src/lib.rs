//! `engine` crate — trigger definitions, trigger evaluation, and the pump
//! that turns fire decisions into dispatched invocations.

pub mod error;
pub mod evaluator;
pub mod models;
pub mod pattern;
pub mod pump;

pub use error::{EngineError, ValidationError};
pub use evaluator::{evaluate_blob, evaluate_message, BlobFire, MessageFire};
pub use models::{QueueName, Trigger, TriggerKind, TriggerRaw, TriggerSubscription};
pub use pattern::BlobPattern;
pub use pump::{Fired, TriggerPump, PAYLOAD_PARAMETER};

#[cfg(test)]
mod pump_tests;
