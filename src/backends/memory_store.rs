//! In-memory store backend.
//!
//! A `DashMap`-based backend implementing the full [`KeyValueBackend`]
//! surface, including atomic create-if-absent and cursor pagination. It is
//! the reference implementation and what the test suite runs against.
//!
//! Not distributed: with this backend the at-most-one-computation guarantee
//! only holds within a single process.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::CacheError;
use crate::traits::KeyValueBackend;

/// Stored value with expiration tracking.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };
        Self { value, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() > expires_at)
    }
}

/// Concurrent in-memory key-value store.
///
/// Expired entries are dropped lazily on read; there is no background
/// eviction. `set_nx` goes through the `DashMap` entry API, which holds the
/// shard lock across the check-and-insert, so it is atomic the way the lock
/// protocol requires.
pub struct MemoryStore {
    map: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { map: DashMap::new() }
    }

    /// Number of stored keys, expired entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Redis-style glob match supporting `*`, `?`, and `[...]` classes.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|i| glob_match(rest, &text[i..])),
        Some((b'?', rest)) => match text.split_first() {
            Some((_, tail)) => glob_match(rest, tail),
            None => false,
        },
        Some((b'[', rest)) => {
            let Some(end) = rest.iter().position(|&b| b == b']') else {
                // Unterminated class: treat the bracket literally, as Redis does
                return match text.split_first() {
                    Some((&c, tail)) if c == b'[' => glob_match(rest, tail),
                    _ => false,
                };
            };
            let (class, after) = rest.split_at(end);
            let Some((&c, tail)) = text.split_first() else {
                return false;
            };
            class_matches(class, c) && glob_match(&after[1..], tail)
        }
        Some((&p, rest)) => match text.split_first() {
            Some((&c, tail)) if c == p => glob_match(rest, tail),
            _ => false,
        },
    }
}

/// Match one byte against a `[...]` class body, with `a-z` ranges.
fn class_matches(class: &[u8], c: u8) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == b'-' {
            if class[i] <= c && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}

#[async_trait]
impl KeyValueBackend for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.map.get(key) {
            if entry.is_expired() {
                drop(entry); // release the shard read lock before removing
                self.map.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.map
            .insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        debug!(key = %key, ttl_ms = %ttl.as_millis(), "[Memory] SET");
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CacheError> {
        match self.map.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(CacheEntry::new(value.to_vec(), ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value.to_vec(), ttl));
                Ok(true)
            }
        }
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.map.remove(key);
        Ok(())
    }

    async fn remove_bulk(&self, keys: &[String]) -> Result<usize, CacheError> {
        let mut removed = 0;
        for key in keys {
            if self.map.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        // Snapshot and sort so the cursor is a stable offset into the match
        // set; Redis cursors are opaque, this one is just an index.
        let mut matches: Vec<String> = self
            .map
            .iter()
            .filter(|entry| {
                !entry.value().is_expired()
                    && glob_match(pattern.as_bytes(), entry.key().as_bytes())
            })
            .map(|entry| entry.key().clone())
            .collect();
        matches.sort();

        let offset = usize::try_from(cursor).unwrap_or(usize::MAX);
        let page: Vec<String> = matches
            .iter()
            .skip(offset)
            .take(count.max(1))
            .cloned()
            .collect();
        let consumed = offset.saturating_add(page.len());
        let next_cursor = if consumed >= matches.len() {
            0
        } else {
            u64::try_from(consumed).unwrap_or(u64::MAX)
        };
        Ok((next_cursor, page))
    }

    async fn health_check(&self) -> bool {
        let test_key = "health_check_memory";
        let test_value = b"health_check_value";

        match self
            .set(test_key, test_value, Duration::from_secs(10))
            .await
        {
            Ok(()) => match self.get(test_key).await {
                Ok(Some(retrieved)) => {
                    let _ = self.remove(test_key).await;
                    retrieved == test_value
                }
                _ => false,
            },
            Err(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
