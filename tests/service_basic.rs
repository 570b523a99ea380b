//! Integration tests for the plain cache-aside operations:
//! set/get round-trips, deletes, TTL handling, and error kinds.

mod common;

use common::test_data::Event;
use common::*;
use stampede_cache::{CacheError, CancellationToken, KeyValueBackend};
use std::time::Duration;

#[tokio::test]
async fn set_then_get_round_trips() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();
    let event = Event::new(42);

    cache
        .set(&cancel, "events:42", &event, Duration::from_secs(60))
        .await
        .unwrap();

    let cached: Option<Event> = cache.get(&cancel, "events:42").await.unwrap();
    assert_eq!(cached, Some(event));
}

#[tokio::test]
async fn get_missing_key_is_a_miss_not_an_error() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();

    let cached: Option<Event> = cache.get(&cancel, "events:absent").await.unwrap();
    assert_eq!(cached, None);
}

#[tokio::test]
async fn delete_then_get_misses() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();

    cache
        .set(&cancel, "k", &Event::new(1), Duration::from_secs(60))
        .await
        .unwrap();
    cache.delete(&cancel, "k").await.unwrap();

    let cached: Option<Event> = cache.get(&cancel, "k").await.unwrap();
    assert_eq!(cached, None);
}

#[tokio::test]
async fn deleting_absent_key_is_ok() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();
    cache.delete(&cancel, "never-existed").await.unwrap();
}

#[tokio::test]
async fn json_value_round_trip_scenario() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();
    let value = serde_json::json!({"x": 1});

    cache
        .set(&cancel, "k", &value, Duration::from_secs(60))
        .await
        .unwrap();

    let cached: Option<serde_json::Value> = cache.get(&cancel, "k").await.unwrap();
    assert_eq!(cached, Some(value));
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();

    cache
        .set(&cancel, "k", &Event::new(1), Duration::from_millis(20))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let cached: Option<Event> = cache.get(&cancel, "k").await.unwrap();
    assert_eq!(cached, None);
}

#[tokio::test]
async fn zero_ttl_means_no_expiry() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();

    cache
        .set(&cancel, "k", &Event::new(1), Duration::ZERO)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let cached: Option<Event> = cache.get(&cancel, "k").await.unwrap();
    assert_eq!(cached, Some(Event::new(1)));
}

#[tokio::test]
async fn corrupt_entry_is_an_error_not_a_miss() {
    let (cache, store) = setup_service();
    let cancel = CancellationToken::new();

    store
        .set("k", b"definitely not json", Duration::from_secs(60))
        .await
        .unwrap();

    let result: Result<Option<Event>, _> = cache.get(&cancel, "k").await;
    assert!(matches!(result, Err(CacheError::Corrupt { .. })));
}

#[tokio::test]
async fn schema_mismatch_is_a_corrupt_entry() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();

    cache
        .set(
            &cancel,
            "k",
            &serde_json::json!({"unexpected": true}),
            Duration::from_secs(60),
        )
        .await
        .unwrap();

    let result: Result<Option<Event>, _> = cache.get(&cancel, "k").await;
    assert!(matches!(result, Err(CacheError::Corrupt { .. })));
}

#[tokio::test]
async fn externally_planted_empty_entry_is_a_miss() {
    let (cache, store) = setup_service();
    let cancel = CancellationToken::new();

    // This layer never writes zero bytes; only an outside writer can
    store.set("k", b"", Duration::from_secs(60)).await.unwrap();

    let cached: Option<serde_json::Value> = cache.get(&cancel, "k").await.unwrap();
    assert_eq!(cached, None);

    // Guarded reads recompute over the degenerate entry instead of failing
    let bytes = cache
        .get_protected::<serde_json::Value, _, _>(
            &cancel,
            "k",
            || async { Ok(serde_json::json!({"y": 2})) },
            Duration::from_secs(60),
        )
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value, serde_json::json!({"y": 2}));
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let (cache, _store) = setup_service();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let get: Result<Option<Event>, _> = cache.get(&cancel, "k").await;
    assert!(get.unwrap_err().is_cancelled());

    let set = cache
        .set(&cancel, "k", &Event::new(1), Duration::from_secs(60))
        .await;
    assert!(set.unwrap_err().is_cancelled());

    let delete = cache.delete(&cancel, "k").await;
    assert!(delete.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn health_check_passes_on_live_store() {
    let (cache, _store) = setup_service();
    assert!(cache.health_check().await);
}
