//! `capabilities` crate — the narrow interfaces the trigger core consumes.
//!
//! Blob listing, message receive/delete, invocation publish, function
//! registry and the fired-event ledger are all external collaborators; the
//! engine and dispatch crates only ever see these trait objects.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::CapabilityError;
pub use traits::{
    BlobEntry, BlobStore, FiredLedger, FunctionDefinition, FunctionRegistry, InvocationSink,
    Message, MessageSource,
};
