//! Remote configuration source.
//!
//! # Data Flow
//! ```text
//! fetch_all / fetch_field (caller supplies timeout)
//!     → resilience::timeouts::with_deadline
//!     → RemoteStore (Redis hash, or in-memory for tests)
//!     → EnvMap / single value, or FetchError::{NotFound, Transport}
//! ```
//!
//! # Design Decisions
//! - The store is addressed as an opaque hash: one key, many fields
//! - Absence is an answer (`NotFound`), not a transport failure
//! - An expired deadline is always `Transport`, never `NotFound`

pub mod error;
pub mod memory;
pub mod redis;
pub mod seed;

use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use self::error::FetchError;
pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use crate::env::EnvMap;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// A hash-shaped key/value store.
///
/// Implementations report a missing hash or field as
/// `FetchError::NotFound` and everything else as `FetchError::Transport`.
/// They do not enforce deadlines themselves; `fetch_all` and `fetch_field`
/// do.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All fields of the hash at `key`.
    async fn get_all(&self, key: &str) -> Result<EnvMap, FetchError>;

    /// One field of the hash at `key`.
    async fn get_field(&self, key: &str, field: &str) -> Result<String, FetchError>;

    /// Write (create or overwrite) fields of the hash at `key`.
    async fn put_fields(&self, key: &str, fields: &EnvMap) -> Result<(), FetchError>;
}

/// Fetch the whole hash at `key`, giving up after `timeout`.
pub async fn fetch_all(
    store: &dyn RemoteStore,
    key: &str,
    timeout: Duration,
) -> Result<EnvMap, FetchError> {
    let started = Instant::now();
    let result = match with_deadline(timeout, store.get_all(key)).await {
        Ok(result) => result,
        Err(expired) => Err(expired.into()),
    };
    metrics::record_fetch("all", started);

    if let Err(ref e) = result {
        tracing::debug!(key = %key, error = %e, "Remote fetch failed");
    }
    result
}

/// Fetch a single field of the hash at `key`, giving up after `timeout`.
pub async fn fetch_field(
    store: &dyn RemoteStore,
    key: &str,
    field: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    let started = Instant::now();
    let result = match with_deadline(timeout, store.get_field(key, field)).await {
        Ok(result) => result,
        Err(expired) => Err(expired.into()),
    };
    metrics::record_fetch("field", started);

    if let Err(ref e) = result {
        tracing::debug!(key = %key, field = %field, error = %e, "Remote field fetch failed");
    }
    result
}
