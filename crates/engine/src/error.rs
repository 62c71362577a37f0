//! Engine-level error types.

use thiserror::Error;

use capabilities::CapabilityError;

/// Malformed trigger/invocation input. Always recoverable locally: report to
/// the caller, never fatal, no partial state left behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A field the trigger kind requires was missing.
    #[error("trigger kind '{kind}' requires field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// A field irrelevant to the trigger kind was populated.
    #[error("field '{field}' is not valid for trigger kind '{kind}'")]
    IrrelevantField {
        kind: &'static str,
        field: &'static str,
    },

    /// Queue name violates the storage system's naming constraints.
    #[error("invalid queue name '{name}': {reason}")]
    InvalidQueueName { name: String, reason: &'static str },

    /// Blob path pattern could not be parsed.
    #[error("invalid blob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An output pattern references a capture the input pattern never binds.
    #[error("pattern '{pattern}' references capture '{name}' which is not bound")]
    UnboundCapture { pattern: String, name: String },
}

/// Errors produced by trigger evaluation and the pump.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A storage/messaging capability failed mid-evaluation.
    #[error("capability failure: {0}")]
    Capability(#[from] CapabilityError),

    /// A subscription names a function the registry does not know.
    #[error("function '{0}' is not registered")]
    UnknownFunction(String),

    /// A queue/service-bus subscription has no configured message source.
    #[error("no message source configured for entity '{0}'")]
    UnknownEntity(String),

    #[error(transparent)]
    Build(#[from] dispatch::BuildError),

    #[error(transparent)]
    Dispatch(#[from] dispatch::DispatchError),
}
