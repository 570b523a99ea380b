//! Typed cache errors.
//!
//! Every failure this crate surfaces is one of a small set of kinds, so
//! callers can tell a store outage from a corrupt entry, a failed fallback
//! computation, or their own cancellation. Best-effort failures (write-back
//! after compute, lock release) are logged and never reach the caller.

use thiserror::Error;

/// Error kinds surfaced by the cache layer.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The remote store could not be reached or rejected the command.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    /// A present entry's bytes did not deserialize into the requested type.
    /// Reported as an error, never as a miss.
    #[error("corrupt cache entry for key '{key}'")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized for storage.
    #[error("cache value serialization failed")]
    Serialize(#[source] serde_json::Error),

    /// The caller-supplied fallback computation failed. Propagated verbatim,
    /// never retried by this layer.
    #[error("fallback computation failed: {0}")]
    Computation(#[source] anyhow::Error),

    /// The caller's cancellation token fired while the operation was in
    /// flight or waiting on another instance's computation.
    #[error("operation cancelled")]
    Cancelled,
}

impl CacheError {
    pub(crate) fn store(err: impl Into<anyhow::Error>) -> Self {
        Self::StoreUnavailable(err.into())
    }

    /// `true` if the operation failed because the caller gave up, not
    /// because anything went wrong downstream.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
