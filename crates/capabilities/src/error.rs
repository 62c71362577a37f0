//! Capability-level error type.

use thiserror::Error;

/// Errors surfaced by a storage/messaging capability.
///
/// Callers use the variant to decide whether a retry is worthwhile:
/// - `Unavailable` — the backend could not be reached; retry with back-off.
/// - `Backend`     — the backend answered with a failure; inspect first.
#[derive(Debug, Error, Clone)]
pub enum CapabilityError {
    /// The backing service could not be reached at all.
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// The backing service rejected or failed the operation.
    #[error("capability backend error: {0}")]
    Backend(String),
}
