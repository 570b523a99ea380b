//! Stampede Cache
//!
//! A cache-aside layer over a remote key-value store featuring:
//! - **Stampede protection**: at most one concurrent recomputation per key
//!   across all service instances, coordinated through the store's atomic
//!   create-if-absent primitive
//! - **Liveness under holder failure**: waiters poll with exponential
//!   backoff and self-compute once the holder's computation budget expires
//! - **Pattern invalidation**: cursor-scanned, batched bulk deletion by
//!   glob pattern
//! - **TTL jitter**: ±10% randomized expiry so keys written in the same
//!   burst do not expire in lockstep
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use stampede_cache::{CacheService, CancellationToken, RedisStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Redis connection is configured via `REDIS_URL` (default
//!     // `redis://127.0.0.1:6379`).
//!     let store = Arc::new(RedisStore::new().await?);
//!     let cache = CacheService::with_defaults(store);
//!     let cancel = CancellationToken::new();
//!
//!     // Compute on miss; concurrent callers for the same key coalesce.
//!     let events: serde_json::Value = cache
//!         .get_with_lock(
//!             &cancel,
//!             "events:list:page=1",
//!             || async {
//!                 // expensive query goes here
//!                 Ok(serde_json::json!([{"id": 1, "title": "opening night"}]))
//!             },
//!             Duration::from_secs(60),
//!         )
//!         .await?;
//!     tracing::info!(?events, "loaded");
//!
//!     // Invalidate everything under the events namespace.
//!     cache.delete_pattern(&cancel, "events:*").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! caller ── get_with_lock(key) ──► cache hit? ──► return value
//!                                  miss ──► SETNX {key}:lock
//!                                    winner: compute ─► SET key (jittered TTL) ─► DEL lock
//!                                    loser:  poll with backoff ─► value | self-compute
//! ```
//!
//! Callers own the key-naming scheme; patterns are only as meaningful as the
//! namespacing the caller applies (e.g. `events:list:page=1`).

pub mod backends;
pub mod error;
pub mod jitter;
pub mod lock;
pub mod service;
pub mod traits;

pub use backends::MemoryStore;
#[cfg(feature = "redis")]
pub use backends::RedisStore;
pub use error::CacheError;
pub use jitter::with_jitter;
pub use lock::DistributedLock;
pub use service::{CacheConfig, CacheService};
pub use traits::KeyValueBackend;

// Re-exports for user convenience at the backend seam and call sites.
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
