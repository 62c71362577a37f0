//! Trigger evaluation — decides *whether* a trigger fires, nothing more.
//!
//! Evaluation never dispatches and never consumes: blob mode only reads
//! listings and timestamps, message mode only peeks. The caller (the pump)
//! drives build/dispatch and commits the side effects afterwards.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use capabilities::{BlobStore, FiredLedger, MessageSource};

use crate::error::EngineError;
use crate::pattern::BlobPattern;

/// A fire decision for one matching blob input object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFire {
    /// Full `container/path` of the input object, used as the ledger key.
    pub path: String,
    pub modified: DateTime<Utc>,
    /// Capture values extracted from the input pattern.
    pub bindings: BTreeMap<String, String>,
}

/// A fire decision for one received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFire {
    /// Receipt id to delete once the dispatch has succeeded.
    pub receipt: String,
    /// Raw message content; becomes the single bound parameter.
    pub body: String,
}

/// Evaluate a blob trigger against the current listing.
///
/// For each object matching `input`, every pattern in `outputs` is resolved
/// and its timestamp fetched (absence counts as infinitely old). The object
/// fires iff the minimum output timestamp is strictly older than the input's
/// — equal timestamps never fire — or there are no outputs at all. Inputs
/// whose `(path, modified)` generation the ledger has already seen are
/// skipped, which keeps a pass idempotent across reruns of an unchanged
/// listing.
pub async fn evaluate_blob(
    input: &BlobPattern,
    outputs: &[BlobPattern],
    store: &dyn BlobStore,
    ledger: &dyn FiredLedger,
) -> Result<Vec<BlobFire>, EngineError> {
    let listing = store.list(input.container(), input.literal_prefix()).await?;
    debug!(
        container = input.container(),
        prefix = input.literal_prefix(),
        listed = listing.len(),
        "evaluating blob trigger"
    );

    let mut fires = Vec::new();
    for entry in listing {
        let Some(bindings) = input.matches(&entry.path) else {
            continue;
        };
        let full_path = format!("{}/{}", input.container(), entry.path);
        if ledger.already_fired(&full_path, entry.last_modified).await? {
            continue;
        }
        if is_stale(&bindings, entry.last_modified, outputs, store).await? {
            fires.push(BlobFire {
                path: full_path,
                modified: entry.last_modified,
                bindings,
            });
        }
    }
    Ok(fires)
}

/// The build-dependency freshness rule: any output strictly older than the
/// input (or missing entirely) makes the outputs stale.
async fn is_stale(
    bindings: &BTreeMap<String, String>,
    input_modified: DateTime<Utc>,
    outputs: &[BlobPattern],
    store: &dyn BlobStore,
) -> Result<bool, EngineError> {
    if outputs.is_empty() {
        return Ok(true);
    }

    let mut min_output: Option<DateTime<Utc>> = None;
    for output in outputs {
        let resolved = output.resolve(bindings)?;
        match store.last_modified(output.container(), &resolved).await? {
            // Absent output is infinitely old: the input is newer by
            // definition.
            None => return Ok(true),
            Some(ts) => min_output = Some(min_output.map_or(ts, |m| m.min(ts))),
        }
    }

    Ok(matches!(min_output, Some(oldest) if oldest < input_modified))
}

/// Evaluate a queue/service-bus trigger: peek at most one message.
///
/// The message is *not* deleted here. The caller commits deletion only after
/// dispatch succeeds, so a dispatch failure leaves the message deliverable.
pub async fn evaluate_message(
    source: &dyn MessageSource,
) -> Result<Option<MessageFire>, EngineError> {
    Ok(source.receive().await?.map(|message| MessageFire {
        receipt: message.id,
        body: message.body,
    }))
}
