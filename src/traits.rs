//! Store backend trait.
//!
//! The cache layer talks to its remote store through [`KeyValueBackend`].
//! Implement it to plug in an alternative store; the crate ships a Redis
//! backend (the production default) and an in-memory backend used as the
//! reference implementation and by the test suite.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CacheError;

/// Typed surface over the remote key-value store.
///
/// The cache layer needs five primitives from whatever store backs it:
/// point reads and TTL'd writes, deletion (single and batched), an atomic
/// create-if-absent with expiry (the lock primitive), and cursor-paginated
/// key enumeration. `Duration::ZERO` always means "no expiry", never
/// "expire immediately".
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the service shares one backend
/// across every concurrent caller.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Fetch raw bytes by key.
    ///
    /// `Ok(None)` is a normal miss. `Err` means the store itself failed; a
    /// miss and a store failure are never conflated.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Write raw bytes with a time-to-live (`Duration::ZERO` = persist).
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Atomically create `key` only if it is absent, with expiry `ttl`.
    ///
    /// Returns whether *this* call created the key. Must be a store-level
    /// test-and-set, not a read followed by a write; it is the sole
    /// mutual-exclusion primitive the lock is built on.
    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CacheError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Remove a batch of keys in one round-trip, returning how many existed.
    async fn remove_bulk(&self, keys: &[String]) -> Result<usize, CacheError>;

    /// One page of a cursor scan for keys matching a glob `pattern`
    /// (`*`, `?`, `[...]`).
    ///
    /// Pass cursor `0` to start; a returned cursor of `0` means the
    /// traversal is complete. `count` is a page-size hint, and a full
    /// traversal may revisit keys.
    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError>;

    /// Verify the backend is reachable and serving.
    async fn health_check(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &'static str {
        "unknown"
    }
}
