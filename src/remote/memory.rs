//! In-process store with latency and outage injection.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::env::EnvMap;
use crate::remote::{FetchError, RemoteStore};

/// A `RemoteStore` kept in memory.
///
/// Clones share the same data, so a test can hold one handle to mutate the
/// hashes while the code under test reads through another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    hashes: Arc<DashMap<String, EnvMap>>,
    latency_ms: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole hash at `key`.
    pub fn insert_hash(&self, key: &str, fields: EnvMap) {
        self.hashes.insert(key.to_string(), fields);
    }

    /// Set one field, creating the hash if needed.
    pub fn set_field(&self, key: &str, field: &str, value: &str) {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    /// Remove one field. An emptied hash disappears, as it would in Redis.
    pub fn remove_field(&self, key: &str, field: &str) {
        if let Some(mut hash) = self.hashes.get_mut(key) {
            hash.remove(field);
        }
        self.hashes.remove_if(key, |_, hash| hash.is_empty());
    }

    /// Delay every read and write by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    async fn round_trip(&self) -> Result<(), FetchError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FetchError::transport("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get_all(&self, key: &str) -> Result<EnvMap, FetchError> {
        self.round_trip().await?;
        self.hashes
            .get(key)
            .map(|hash| hash.value().clone())
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| FetchError::not_found(key, None))
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<String, FetchError> {
        self.round_trip().await?;
        self.hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned())
            .ok_or_else(|| FetchError::not_found(key, Some(field)))
    }

    async fn put_fields(&self, key: &str, fields: &EnvMap) -> Result<(), FetchError> {
        self.round_trip().await?;
        let mut hash = self.hashes.entry(key.to_string()).or_default();
        hash.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}
