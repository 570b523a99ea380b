//! Distributed lock on the store's atomic create-if-absent primitive.
//!
//! Ownership is key existence: whoever created `{key}:lock` owns the
//! computation. There is no owner token, so release is unconditional
//! deletion; the lock's own TTL bounds how long a stale lock can linger if
//! a holder crashes before releasing.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::error::CacheError;
use crate::traits::KeyValueBackend;

const LOCK_SUFFIX: &str = ":lock";

/// Derive the lock key for a cache key.
#[must_use]
pub fn lock_key(key: &str) -> String {
    format!("{key}{LOCK_SUFFIX}")
}

/// Short-lived mutual-exclusion token shared through the store.
pub struct DistributedLock {
    store: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Atomically create `lock_key` with the lock TTL.
    ///
    /// Returns whether this call created it, i.e. whether the caller now
    /// owns the computation.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::StoreUnavailable`] if the store call fails.
    pub async fn try_acquire(&self, lock_key: &str) -> Result<bool, CacheError> {
        self.store.set_nx(lock_key, b"1", self.ttl).await
    }

    /// Delete the lock key.
    ///
    /// A failed release never fails the surrounding computation; it is
    /// logged, and the lock TTL is the upper bound on the resulting
    /// staleness.
    pub async fn release(&self, lock_key: &str) {
        if let Err(err) = self.store.remove(lock_key).await {
            warn!(lock_key = %lock_key, error = %err, "failed to release lock");
        }
    }
}
