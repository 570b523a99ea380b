//! Redis store backend.
//!
//! Wraps `ConnectionManager` for automatic reconnection. This is the
//! production backend shared by every service instance, which is what makes
//! the lock protocol hold across processes.

use anyhow::Context;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::traits::KeyValueBackend;

/// Redis backend with `ConnectionManager` for automatic reconnection.
pub struct RedisStore {
    conn_manager: ConnectionManager,
}

impl RedisStore {
    /// Connect using the `REDIS_URL` environment variable.
    /// Default: `redis://127.0.0.1:6379`
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the connection
    /// (including the initial PING) fails.
    pub async fn new() -> anyhow::Result<Self> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        Self::with_url(&redis_url).await
    }

    /// Connect to a specific Redis URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the connection
    /// (including the initial PING) fails.
    pub async fn with_url(redis_url: &str) -> anyhow::Result<Self> {
        info!(redis_url = %redis_url, "Initializing Redis store with ConnectionManager");

        let client = Client::open(redis_url)
            .with_context(|| format!("Failed to create Redis client with URL: {redis_url}"))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .context("Failed to establish Redis connection manager")?;

        // Test connection
        let mut conn = conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis PING health check failed")?;

        info!(redis_url = %redis_url, "Redis store connected");

        Ok(Self { conn_manager })
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl KeyValueBackend for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(CacheError::store)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();

        if ttl.is_zero() {
            // Explicit "no expiry"
            let _: () = conn.set(key, value).await.map_err(CacheError::store)?;
        } else {
            // PX keeps sub-second TTLs exact
            let _: () = redis::cmd("SET")
                .arg(key)
                .arg(value)
                .arg("PX")
                .arg(ttl_millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(CacheError::store)?;
        }
        debug!(key = %key, ttl_ms = %ttl.as_millis(), "[Redis] SET");
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.conn_manager.clone();

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if !ttl.is_zero() {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        // SET ... NX replies OK when it created the key, Nil otherwise
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(CacheError::store)?;
        Ok(reply.is_some())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.del(key).await.map_err(CacheError::store)?;
        Ok(())
    }

    async fn remove_bulk(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn_manager.clone();
        let count: usize = conn.del(keys).await.map_err(CacheError::store)?;
        debug!(count = count, "[Redis] Removed keys in bulk");
        Ok(count)
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> Result<(u64, Vec<String>), CacheError> {
        let mut conn = self.conn_manager.clone();

        // SCAN cursor MATCH pattern COUNT n
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(CacheError::store)?;

        debug!(pattern = %pattern, page = keys.len(), "[Redis] SCAN page");
        Ok((next_cursor, keys))
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn_manager.clone();
        let reply: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        reply.is_ok()
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
