//! Capability traits — the contracts the trigger core depends on.
//!
//! Defined here (in the capabilities crate) so the engine and dispatch crates
//! can both import them without a circular dependency. Real backends (cloud
//! blob stores, queue services) implement these; tests and the dev server use
//! the in-memory versions in [`crate::memory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CapabilityError;

// ---------------------------------------------------------------------------
// Blob store
// ---------------------------------------------------------------------------

/// One object returned by a listing: its full path and last-modified time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Path relative to the container, e.g. `input/a.txt`.
    pub path: String,
    pub last_modified: DateTime<Utc>,
}

/// Read-only view of a blob container, sufficient for freshness checks.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List objects in `container` whose path starts with `prefix`,
    /// with their last-modified timestamps.
    async fn list(&self, container: &str, prefix: &str)
        -> Result<Vec<BlobEntry>, CapabilityError>;

    /// Last-modified timestamp of a single object, or `None` if it does
    /// not exist.
    async fn last_modified(
        &self,
        container: &str,
        path: &str,
    ) -> Result<Option<DateTime<Utc>>, CapabilityError>;
}

// ---------------------------------------------------------------------------
// Message source (queue / service-bus)
// ---------------------------------------------------------------------------

/// A message pulled from a queue or service-bus entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Receipt identifier used to delete the message after processing.
    pub id: String,
    /// Raw message content.
    pub body: String,
}

/// Receive-and-delete view of one queue or service-bus entity.
///
/// Receiving does not consume: a message stays (re)deliverable until
/// [`MessageSource::delete`] succeeds. The caller commits deletion only
/// after the work the message triggered has been safely handed off.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Pull the next message, or `None` when the entity is empty.
    async fn receive(&self) -> Result<Option<Message>, CapabilityError>;

    /// Delete a previously received message by its receipt id.
    async fn delete(&self, message_id: &str) -> Result<(), CapabilityError>;
}

// ---------------------------------------------------------------------------
// Invocation sink
// ---------------------------------------------------------------------------

/// Publish side of the execution queue consumed by workers.
#[async_trait]
pub trait InvocationSink: Send + Sync {
    /// Enqueue one serialized invocation payload.
    async fn enqueue(&self, payload: String) -> Result<(), CapabilityError>;
}

// ---------------------------------------------------------------------------
// Function registry
// ---------------------------------------------------------------------------

/// A registered function as the dispatcher needs to see it: identity,
/// declared parameter names, and the account/context it executes under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub id: String,
    /// Parameter names the function declares; bindings outside this set are
    /// a caller bug.
    pub parameters: Vec<String>,
    /// Storage account / execution context the function runs against.
    pub account: String,
}

/// Lookup of registered function definitions (owned and indexed elsewhere).
#[async_trait]
pub trait FunctionRegistry: Send + Sync {
    /// `None` means the function is not registered — an expected outcome,
    /// distinct from a backend failure.
    async fn lookup(&self, function_id: &str)
        -> Result<Option<FunctionDefinition>, CapabilityError>;
}

// ---------------------------------------------------------------------------
// Fired-event ledger
// ---------------------------------------------------------------------------

/// Record of blob inputs already dispatched, keyed by `(path, last_modified)`.
///
/// The evaluator consults this to keep a pass idempotent: an input object
/// already fired at a given generation is skipped until it is modified again.
/// The core does not own persistence of this set; it is injected.
#[async_trait]
pub trait FiredLedger: Send + Sync {
    async fn already_fired(
        &self,
        path: &str,
        modified: DateTime<Utc>,
    ) -> Result<bool, CapabilityError>;

    /// Mark an input generation as dispatched. Called by the pump only after
    /// a successful dispatch.
    async fn mark_fired(
        &self,
        path: &str,
        modified: DateTime<Utc>,
    ) -> Result<(), CapabilityError>;
}
