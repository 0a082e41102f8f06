//! Initial remote load.

use std::sync::Arc;
use std::time::Duration;

use crate::env::{materialize, merge, EnvMap, EnvRecord};
use crate::error::Error;
use crate::reload::live::LiveConfig;
use crate::remote::{fetch_all, RemoteStore};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Builds the first `LiveConfig` from a remote hash.
///
/// ```ignore
/// let live = RemoteEnvLoader::new("config")
///     .base_env(bootstrap_env(None)?)
///     .load::<AppEnv>(&store)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct RemoteEnvLoader {
    key: String,
    timeout: Duration,
    error_at_not_found: bool,
    base: EnvMap,
}

impl RemoteEnvLoader {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            error_at_not_found: false,
            base: EnvMap::new(),
        }
    }

    /// Deadline for the initial fetch.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fail when the remote hash does not exist instead of falling back to
    /// the base environment.
    pub fn error_at_not_found(mut self, enabled: bool) -> Self {
        self.error_at_not_found = enabled;
        self
    }

    /// Entries remote values are layered on, usually the bootstrap map.
    pub fn base_env(mut self, base: EnvMap) -> Self {
        self.base = base;
        self
    }

    /// Fetch, merge and materialize the first record.
    pub async fn load<T: EnvRecord>(self, store: &dyn RemoteStore) -> Result<Arc<LiveConfig<T>>, Error> {
        let env = match fetch_all(store, &self.key, self.timeout).await {
            Ok(remote) => {
                tracing::info!(key = %self.key, fields = remote.len(), "Remote configuration loaded");
                merge(&self.base, remote)
            }
            Err(e) if e.is_not_found() && !self.error_at_not_found => {
                tracing::warn!(key = %self.key, "Remote configuration not found, using local environment only");
                self.base.clone()
            }
            Err(e) => return Err(e.into()),
        };

        let record = materialize::<T>(&env)?;
        Ok(Arc::new(LiveConfig::new(self.key, self.base, env, record)))
    }
}
