//! Key-value store backends.
//!
//! - [`RedisStore`]: the production backend (feature `redis`, on by default)
//! - [`MemoryStore`]: in-process reference backend, used by the test suite

pub mod memory_store;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use memory_store::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
