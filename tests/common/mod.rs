//! Shared test infrastructure: in-memory service setup and sample payloads.
//!
//! Every test gets a fresh `MemoryStore`, so tests are isolated without
//! unique key prefixes and run without a live Redis.

#![allow(dead_code)] // each test binary uses a subset of the helpers

use std::sync::{Arc, Once};
use std::time::Duration;
use stampede_cache::{CacheConfig, CacheService, MemoryStore};

static TRACING: Once = Once::new();

/// Route crate logs through a test subscriber; `RUST_LOG` controls
/// verbosity (e.g. `RUST_LOG=stampede_cache=debug cargo test`).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Service over a fresh in-memory store. The store handle is returned too,
/// for direct manipulation (planting locks, inspecting raw entries).
pub fn setup_service() -> (CacheService, Arc<MemoryStore>) {
    setup_service_with(CacheConfig::default())
}

/// Service with fast backoff so wait-loop tests finish in milliseconds.
pub fn setup_fast_service() -> (CacheService, Arc<MemoryStore>) {
    setup_service_with(CacheConfig {
        lock_ttl: Duration::from_secs(1),
        retry_delay: Duration::from_millis(5),
        max_retry_delay: Duration::from_millis(20),
        max_retries: 4,
        scan_count: 100,
    })
}

pub fn setup_service_with(config: CacheConfig) -> (CacheService, Arc<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let service = CacheService::new(store.clone(), config);
    (service, store)
}

/// Sample payload types mirroring the kind of data the service caches.
pub mod test_data {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Event {
        pub id: u64,
        pub title: String,
        pub capacity: u32,
    }

    impl Event {
        pub fn new(id: u64) -> Self {
            Self {
                id,
                title: format!("Event {id}"),
                capacity: 100,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct Booking {
        pub id: u64,
        pub event_id: u64,
        pub seats: u32,
    }

    impl Booking {
        pub fn new(id: u64, event_id: u64) -> Self {
            Self {
                id,
                event_id,
                seats: 2,
            }
        }
    }
}
