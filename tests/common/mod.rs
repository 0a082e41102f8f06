//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use envsync::bus::MemoryBus;
use envsync::env::{materialize, EnvMap, EnvRecord, Field, MaterializeError};
use envsync::reload::{request_reload, LiveConfig, ReloadCoordinator, ReloadHandle, RemoteEnvLoader};
use envsync::remote::MemoryStore;

pub const KEY: &str = "config";
pub const PROJECT: &str = "proj1";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Record used across the integration tests.
#[derive(Debug, Clone, PartialEq)]
pub struct TestEnv {
    pub a: String,
    pub b: String,
    pub c: String,
    pub port: u16,
    pub nested: String,
}

impl EnvRecord for TestEnv {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
        Ok(Self {
            a: Field::new("a").required().read(env)?,
            b: Field::new("b").read(env)?,
            c: Field::new("c").default("c-default").read(env)?,
            port: Field::new("port").default("8080").validate(|p| *p != 0).read(env)?,
            nested: Field::new("a.b.c").read(env)?,
        })
    }
}

pub fn env(pairs: &[(&str, &str)]) -> EnvMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// A store, a bus, a live config loaded from `initial` and a coordinator
/// serving it for `PROJECT`.
pub struct Harness {
    pub store: MemoryStore,
    pub bus: MemoryBus,
    pub live: Arc<LiveConfig<TestEnv>>,
    pub coordinator: ReloadCoordinator,
    pub handle: ReloadHandle,
}

impl Harness {
    pub async fn start(initial: &[(&str, &str)]) -> Self {
        Self::start_with_timeout(initial, Duration::from_secs(1)).await
    }

    pub async fn start_with_timeout(initial: &[(&str, &str)], fetch_timeout: Duration) -> Self {
        let store = MemoryStore::new();
        let bus = MemoryBus::new();
        store.insert_hash(KEY, env(initial));

        let live = RemoteEnvLoader::new(KEY).load::<TestEnv>(&store).await.unwrap();
        let coordinator = ReloadCoordinator::new(Arc::new(bus.clone()), Arc::new(store.clone()))
            .fetch_timeout(fetch_timeout);
        let handle = coordinator.subscribe(PROJECT, live.clone()).await.unwrap();

        Self {
            store,
            bus,
            live,
            coordinator,
            handle,
        }
    }

    /// Send a reload request and return the reply text.
    pub async fn reload(&self, field: Option<&str>) -> String {
        request_reload(&self.bus, "reload", PROJECT, field, REQUEST_TIMEOUT)
            .await
            .unwrap()
    }

    /// Replace the remote hash.
    pub fn remote(&self, pairs: &[(&str, &str)]) {
        self.store.insert_hash(KEY, env(pairs));
    }
}

/// A live config built directly from `pairs`, without a remote load.
pub fn live_from(key: &str, pairs: &[(&str, &str)]) -> Arc<LiveConfig<TestEnv>> {
    let env = env(pairs);
    let record = materialize(&env).unwrap();
    Arc::new(LiveConfig::new(key, EnvMap::new(), env, record))
}
