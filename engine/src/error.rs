//! Error taxonomy for sync cycles.

use crate::adapter::AdapterError;
use crate::decision::Side;
use thiserror::Error;

/// All terminal failure modes of one reconciliation cycle.
///
/// None of these are fatal to the process; every one is surfaced to the
/// caller, who decides whether to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A read (or last-modified probe) failed or timed out. No write was
    /// attempted on either side: a write must never derive from a partial
    /// read.
    #[error("reading store {side} failed: {cause}")]
    ReadFailure { side: Side, cause: AdapterError },

    /// The write to the losing side failed after a direction was chosen.
    /// The losing store's prior contents are assumed unchanged under the
    /// adapter's all-or-nothing write contract.
    #[error("writing store {side} failed: {cause}")]
    WriteFailure { side: Side, cause: AdapterError },

    /// Contents differ but neither side is strictly newer; the cycle stops
    /// without writing and an operator has to break the tie.
    #[error("stores differ but neither side is strictly newer; refusing to overwrite")]
    AmbiguousConflict,

    /// Another cycle holds the engine; this request was rejected, not queued.
    #[error("a sync cycle is already in flight")]
    CycleInFlight,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
