//! Cache service: cache-aside reads and writes with stampede protection.
//!
//! [`CacheService`] wraps a [`KeyValueBackend`] with typed JSON
//! (de)serialization, a per-key distributed lock, exponential backoff for
//! callers that lost the lock race, glob-pattern bulk invalidation, and TTL
//! jitter on write-back.
//!
//! The service holds no global state: construct it with a store handle and a
//! [`CacheConfig`] and pass it where it is needed.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::jitter::with_jitter;
use crate::lock::{DistributedLock, lock_key};
use crate::traits::KeyValueBackend;

/// Keys are deleted in fixed-size batches to bound per-command payloads.
const DELETE_BATCH_SIZE: usize = 100;

/// Backoff growth factor between polls while waiting on another computer.
const RETRY_GROWTH: f64 = 1.5;

/// Tuning knobs for locking, backoff, and scans.
///
/// Defaults: a 50 ms initial poll delay growing 1.5x per miss up to 2 s,
/// ten polls before a waiter gives up and computes for itself, and a 10 s
/// computation budget on the lock.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL on the per-key computation lock: the budget a holder has to
    /// finish computing before waiters may take over.
    pub lock_ttl: Duration,
    /// First poll delay for callers waiting on another holder's computation.
    pub retry_delay: Duration,
    /// Upper bound on the growing poll delay.
    pub max_retry_delay: Duration,
    /// Polls before a waiter self-computes.
    pub max_retries: u32,
    /// Page-size hint for pattern scans.
    pub scan_count: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(10),
            retry_delay: Duration::from_millis(50),
            max_retry_delay: Duration::from_secs(2),
            max_retries: 10,
            scan_count: 100,
        }
    }
}

/// Cache-aside service with stampede protection.
///
/// Cross-caller coordination happens entirely through the store's atomic
/// create-if-absent primitive; there is no in-process mutex, so the
/// at-most-one-computation guarantee holds across service instances, not
/// just within one process.
pub struct CacheService {
    store: Arc<dyn KeyValueBackend>,
    lock: DistributedLock,
    config: CacheConfig,
}

impl CacheService {
    pub fn new(store: Arc<dyn KeyValueBackend>, config: CacheConfig) -> Self {
        let lock = DistributedLock::new(Arc::clone(&store), config.lock_ttl);
        Self {
            store,
            lock,
            config,
        }
    }

    /// Construct with [`CacheConfig::default`].
    pub fn with_defaults(store: Arc<dyn KeyValueBackend>) -> Self {
        Self::new(store, CacheConfig::default())
    }

    /// Typed cache read.
    ///
    /// `Ok(None)` is a normal miss. Non-empty bytes that fail to
    /// deserialize into `T` are a [`CacheError::Corrupt`] entry, never
    /// silently treated as a miss. An externally planted empty entry is a
    /// miss: this layer never writes zero bytes, and guarded reads must
    /// recompute over it rather than fail.
    ///
    /// # Errors
    ///
    /// [`CacheError::StoreUnavailable`], [`CacheError::Corrupt`], or
    /// [`CacheError::Cancelled`].
    pub async fn get<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        key: &str,
    ) -> Result<Option<T>, CacheError> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };
        if bytes.is_empty() {
            // Degenerate entry this layer never writes itself (JSON encoding
            // is never zero bytes); treat it as a miss so guarded reads
            // recompute instead of failing
            return Ok(None);
        }
        let value = serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    /// JSON-encode `value` and write it with `ttl`.
    ///
    /// `Duration::ZERO` means "no expiry" and must be deliberate.
    ///
    /// # Errors
    ///
    /// [`CacheError::Serialize`], [`CacheError::StoreUnavailable`], or
    /// [`CacheError::Cancelled`].
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        let bytes = serde_json::to_vec(value).map_err(CacheError::Serialize)?;
        self.store.set(key, &bytes, ttl).await
    }

    /// Remove a key. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// [`CacheError::StoreUnavailable`] or [`CacheError::Cancelled`].
    pub async fn delete(&self, cancel: &CancellationToken, key: &str) -> Result<(), CacheError> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        self.store.remove(key).await
    }

    /// Delete every key matching a glob `pattern`.
    ///
    /// The key space is traversed in full and all matches accumulated before
    /// any deletion is issued: a scan pass may revisit keys, so interleaving
    /// scan and delete could miss some. Deletion then runs in batches of
    /// 100. No matches is a no-op.
    ///
    /// # Errors
    ///
    /// [`CacheError::StoreUnavailable`] or [`CacheError::Cancelled`].
    pub async fn delete_pattern(
        &self,
        cancel: &CancellationToken,
        pattern: &str,
    ) -> Result<(), CacheError> {
        let mut all_keys = Vec::new();
        let mut cursor = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            let (next_cursor, keys) = self
                .store
                .scan_page(cursor, pattern, self.config.scan_count)
                .await?;
            all_keys.extend(keys);
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        debug!(pattern = %pattern, matched = all_keys.len(), "pattern scan complete");

        for batch in all_keys.chunks(DELETE_BATCH_SIZE) {
            if cancel.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            self.store.remove_bulk(batch).await?;
        }
        Ok(())
    }

    /// Get `key`, or compute it with at most one concurrent computation.
    ///
    /// The fast path returns the cached value. On a miss, callers race for
    /// the `{key}:lock` test-and-set: the winner runs `compute`, writes the
    /// result back with a jittered `base_ttl`, and releases the lock
    /// unconditionally; losers poll the cache with exponential backoff. A
    /// waiter that exhausts its polls assumes the holder died and computes
    /// for itself, trading exactly-once for liveness.
    ///
    /// # Errors
    ///
    /// Store failures and a failed `compute`
    /// ([`CacheError::Computation`]) propagate; cancellation surfaces as
    /// [`CacheError::Cancelled`]. A failed write-back or lock release is
    /// logged and does not fail the call.
    pub async fn get_with_lock<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        compute: F,
        base_ttl: Duration,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        if let Some(value) = self.get(cancel, key).await? {
            return Ok(value);
        }

        let lock_key = lock_key(key);
        if self.lock.try_acquire(&lock_key).await? {
            let result = self.compute_and_store(cancel, key, compute, base_ttl).await;
            self.lock.release(&lock_key).await;
            return result;
        }

        self.wait_for_computation(cancel, key, compute, base_ttl)
            .await
    }

    /// Cache-aside read returning the wire representation.
    ///
    /// A hit returns the cached bytes as-is; a miss runs the full
    /// [`Self::get_with_lock`] protocol and re-serializes the computed
    /// value, so callers see the same JSON bytes on either path.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_with_lock`], plus [`CacheError::Serialize`] when
    /// re-serializing the computed value.
    pub async fn get_protected<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        compute: F,
        base_ttl: Duration,
    ) -> Result<Vec<u8>, CacheError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        if let Some(bytes) = self.store.get(key).await? {
            if !bytes.is_empty() {
                return Ok(bytes);
            }
        }

        let value: T = self.get_with_lock(cancel, key, compute, base_ttl).await?;
        serde_json::to_vec(&value).map_err(CacheError::Serialize)
    }

    /// Randomize a base TTL; see [`crate::jitter::with_jitter`].
    #[must_use]
    pub fn with_jitter(&self, base_ttl: Duration) -> Duration {
        with_jitter(base_ttl)
    }

    /// Smoke-check the underlying store.
    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    /// Run `compute` and write the result back with a jittered TTL.
    ///
    /// Write-back is best-effort: the freshly computed value is correct for
    /// this call regardless, a failed write only costs future hit rate.
    async fn compute_and_store<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        compute: F,
        base_ttl: Duration,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let value = compute().await.map_err(CacheError::Computation)?;

        let ttl = with_jitter(base_ttl);
        if let Err(err) = self.set(cancel, key, &value, ttl).await {
            warn!(key = %key, error = %err, "failed to cache computed value");
        }
        Ok(value)
    }

    /// Poll the cache while another caller owns the computation.
    ///
    /// Delay grows 1.5x per unsuccessful poll up to `max_retry_delay`, for
    /// at most `max_retries` polls; every sleep is preempted by `cancel`.
    /// Exhaustion means the holder most likely crashed, so the waiter
    /// computes for itself rather than starve.
    async fn wait_for_computation<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        key: &str,
        compute: F,
        base_ttl: Duration,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let mut delay = self.config.retry_delay;

        for _ in 0..self.config.max_retries {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return Err(CacheError::Cancelled),
            }

            if let Some(value) = self.get(cancel, key).await? {
                return Ok(value);
            }

            delay = delay.mul_f64(RETRY_GROWTH).min(self.config.max_retry_delay);
        }

        warn!(key = %key, "stampede wait exhausted, computing locally");
        self.compute_and_store(cancel, key, compute, base_ttl).await
    }
}
