//! The live configuration: cached environment plus the installed record.
//!
//! # Design Decisions
//! - Readers get an `Arc<T>` from an `ArcSwap`; they never lock and never
//!   see a record that is still being built
//! - Writers hold one async mutex across fetch → map update →
//!   materialization → swap, so field updates cannot interleave
//! - The map and the record are committed together, and only after the new
//!   record materialized cleanly (last known good)

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::sync::{watch, Mutex};

use crate::env::{materialize, merge, EnvMap, EnvRecord, MaterializeError};
use crate::observability::metrics;
use crate::remote::{fetch_all, fetch_field, FetchError, RemoteStore};

/// Why a reload was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

impl ReloadError {
    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            ReloadError::Fetch(FetchError::NotFound { .. }) => "not_found",
            ReloadError::Fetch(FetchError::Transport { .. }) => "transport",
            ReloadError::Materialize(_) => "invalid",
        }
    }
}

/// A record kept in sync with a remote hash.
pub struct LiveConfig<T> {
    key: String,
    base: EnvMap,
    env: Mutex<EnvMap>,
    current: ArcSwap<T>,
    generation: watch::Sender<u64>,
}

impl<T: EnvRecord> LiveConfig<T> {
    /// Wrap an already materialized `record`.
    ///
    /// `base` is the map remote snapshots are layered on during a full
    /// reload; `env` is the map `record` was built from.
    pub fn new(key: impl Into<String>, base: EnvMap, env: EnvMap, record: T) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            key: key.into(),
            base,
            env: Mutex::new(env),
            current: ArcSwap::from_pointee(record),
            generation,
        }
    }

    /// The remote hash key this config mirrors.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The currently installed record.
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    /// Number of reloads installed since the initial load.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Receiver that changes whenever a new record is installed.
    pub fn watch_generation(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }

    /// Copy of the map behind the installed record.
    ///
    /// Waits for an in-flight reload to finish.
    pub async fn env_snapshot(&self) -> EnvMap {
        self.env.lock().await.clone()
    }

    /// Replace the whole map with `base` overlaid by a fresh remote snapshot.
    pub async fn reload_all(&self, store: &dyn RemoteStore, timeout: Duration) -> Result<u64, ReloadError> {
        let mut env = self.env.lock().await;
        let remote = fetch_all(store, &self.key, timeout).await?;
        let next = merge(&self.base, remote);
        let record = materialize::<T>(&next)?;
        *env = next;
        Ok(self.install(record))
    }

    /// Refresh a single `field` from the remote hash.
    pub async fn reload_field(
        &self,
        store: &dyn RemoteStore,
        field: &str,
        timeout: Duration,
    ) -> Result<u64, ReloadError> {
        let mut env = self.env.lock().await;
        let value = fetch_field(store, &self.key, field, timeout).await?;
        let mut next = env.clone();
        next.insert(field.to_string(), value);
        let record = materialize::<T>(&next)?;
        *env = next;
        Ok(self.install(record))
    }

    // Caller must hold the env lock.
    fn install(&self, record: T) -> u64 {
        self.current.store(Arc::new(record));
        let mut installed = 0;
        self.generation.send_modify(|generation| {
            *generation += 1;
            installed = *generation;
        });
        metrics::record_generation(&self.key, installed);
        installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Field;
    use crate::remote::MemoryStore;

    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        a: String,
        b: String,
        port: u16,
    }

    impl EnvRecord for Record {
        fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
            Ok(Self {
                a: Field::new("a").required().read(env)?,
                b: Field::new("b").default("b-default").read(env)?,
                port: Field::new("port").default("80").validate(|p| *p != 0).read(env)?,
            })
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn live(pairs: &[(&str, &str)]) -> LiveConfig<Record> {
        let env = env(pairs);
        let record = materialize(&env).unwrap();
        LiveConfig::new("config", EnvMap::new(), env, record)
    }

    #[tokio::test]
    async fn test_reload_all_replaces_everything() {
        let config = live(&[("a", "old"), ("b", "old-b")]);
        let store = MemoryStore::new();
        store.insert_hash("config", env(&[("a", "new"), ("port", "8080")]));

        assert_eq!(config.reload_all(&store, TIMEOUT).await, Ok(1));
        let record = config.load();
        assert_eq!(record.a, "new");
        assert_eq!(record.b, "b-default");
        assert_eq!(record.port, 8080);
        assert_eq!(config.generation(), 1);
        assert!(!config.env_snapshot().await.contains_key("b"));
    }

    #[tokio::test]
    async fn test_reload_all_overlays_base() {
        let base = env(&[("a", "from-base"), ("b", "base-b")]);
        let record = materialize::<Record>(&base).unwrap();
        let config = LiveConfig::new("config", base.clone(), base, record);
        let store = MemoryStore::new();
        store.insert_hash("config", env(&[("b", "remote-b")]));

        config.reload_all(&store, TIMEOUT).await.unwrap();
        let record = config.load();
        assert_eq!(record.a, "from-base");
        assert_eq!(record.b, "remote-b");
    }

    #[tokio::test]
    async fn test_reload_field_changes_only_that_field() {
        let config = live(&[("a", "x"), ("b", "y"), ("port", "81")]);
        let before = config.load();
        let store = MemoryStore::new();
        store.insert_hash("config", env(&[("a", "ignored"), ("b", "patched"), ("port", "9")]));

        config.reload_field(&store, "b", TIMEOUT).await.unwrap();
        let after = config.load();
        assert_eq!(after.b, "patched");
        assert_eq!(after.a, before.a);
        assert_eq!(after.port, before.port);
    }

    #[tokio::test]
    async fn test_invalid_update_keeps_last_known_good() {
        let config = live(&[("a", "x"), ("port", "81")]);
        let before = config.load();
        let snapshot = config.env_snapshot().await;
        let store = MemoryStore::new();
        store.insert_hash("config", env(&[("a", "x"), ("port", "0")]));

        let err = config.reload_field(&store, "port", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ReloadError::Materialize(MaterializeError::Validation { .. })));
        assert_eq!(err.outcome(), "invalid");
        assert_eq!(*config.load(), *before);
        assert_eq!(config.env_snapshot().await, snapshot);
        assert_eq!(config.generation(), 0);

        let err = config.reload_all(&store, TIMEOUT).await.unwrap_err();
        assert_eq!(err.outcome(), "invalid");
        assert_eq!(*config.load(), *before);
    }

    #[tokio::test]
    async fn test_fetch_failures_leave_state_untouched() {
        let config = live(&[("a", "x")]);
        let store = MemoryStore::new();

        let err = config.reload_all(&store, TIMEOUT).await.unwrap_err();
        assert_eq!(err.outcome(), "not_found");

        store.set_field("config", "a", "y");
        store.set_available(false);
        let err = config.reload_field(&store, "a", TIMEOUT).await.unwrap_err();
        assert_eq!(err.outcome(), "transport");

        assert_eq!(config.load().a, "x");
        assert_eq!(config.generation(), 0);
    }

    #[tokio::test]
    async fn test_readers_are_not_blocked_by_a_slow_reload() {
        let config = Arc::new(live(&[("a", "x")]));
        let store = MemoryStore::new();
        store.insert_hash("config", env(&[("a", "y")]));
        store.set_latency(Duration::from_millis(200));

        let writer = {
            let config = config.clone();
            let store = store.clone();
            tokio::spawn(async move { config.reload_all(&store, TIMEOUT).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(config.load().a, "x");

        writer.await.unwrap().unwrap();
        assert_eq!(config.load().a, "y");
    }

    #[tokio::test]
    async fn test_watch_generation() {
        let config = live(&[("a", "x")]);
        let mut changes = config.watch_generation();
        let store = MemoryStore::new();
        store.insert_hash("config", env(&[("a", "y")]));

        config.reload_all(&store, TIMEOUT).await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow(), 1);
    }
}
