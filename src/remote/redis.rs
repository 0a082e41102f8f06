//! Redis-backed store.
//!
//! # Responsibilities
//! - Open a multiplexed, auto-reconnecting connection (`ConnectionManager`)
//! - Verify the server with `PING` before first use
//! - Map `HGETALL` / `HGET` / `HSET` onto `RemoteStore`
//!
//! # Design Decisions
//! - Redis deletes a hash when its last field goes, so an empty `HGETALL`
//!   reply means the key does not exist
//! - A nil `HGET` reply is `NotFound`, any Redis error is `Transport`

use std::collections::HashMap;
use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;
use async_trait::async_trait;

use crate::env::EnvMap;
use crate::remote::{FetchError, RemoteStore};
use crate::resilience::timeouts::with_deadline;

/// Shared handle to a Redis server. Cheap to clone.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `url` (`redis://[:password@]host:port/db`) and check it
    /// answers `PING`, all within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = ::redis::Client::open(url)?;
        let conn = with_deadline(timeout, client.get_connection_manager()).await??;
        let store = Self { conn };
        with_deadline(timeout, store.ping()).await??;
        Ok(store)
    }

    /// Wrap an already established connection.
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn ping(&self) -> Result<(), FetchError> {
        let mut conn = self.conn.clone();
        let pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(FetchError::transport(format!("unexpected PING response: {}", pong)));
        }
        tracing::debug!("Redis connection verified");
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get_all(&self, key: &str) -> Result<EnvMap, FetchError> {
        let mut conn = self.conn.clone();
        let hash: HashMap<String, String> = conn.hgetall(key).await?;
        if hash.is_empty() {
            return Err(FetchError::not_found(key, None));
        }
        Ok(hash)
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<String, FetchError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        value.ok_or_else(|| FetchError::not_found(key, Some(field)))
    }

    async fn put_fields(&self, key: &str, fields: &EnvMap) -> Result<(), FetchError> {
        if fields.is_empty() {
            return Ok(());
        }
        let items: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, &items).await?;
        Ok(())
    }
}
