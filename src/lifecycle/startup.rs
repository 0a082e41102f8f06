//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the remote store and the notification bus from settings
//! - Verify both are reachable before anything is loaded
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Backends are handed out as trait objects so the rest of the binary
//!   never names Redis or NATS

use std::sync::Arc;

use thiserror::Error;

use crate::bus::{BusError, NatsBus, NotificationBus};
use crate::config::Settings;
use crate::remote::{FetchError, RedisStore, RemoteStore};

/// Errors while connecting to the backends.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid redis settings: {0}")]
    RedisUrl(#[from] url::ParseError),

    #[error("redis unavailable: {0}")]
    Redis(#[from] FetchError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Connected store and bus.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn RemoteStore>,
    pub bus: Arc<dyn NotificationBus>,
}

/// Connect to Redis and verify it answers.
pub async fn connect_store(settings: &Settings) -> Result<Arc<dyn RemoteStore>, StartupError> {
    let redis_url = settings.redis.connection_url()?;
    let store = RedisStore::connect(redis_url.as_str(), settings.loader.connect_timeout).await?;
    tracing::info!(
        host = %settings.redis.host,
        port = settings.redis.port,
        db = settings.redis.db,
        "Connected to Redis"
    );
    Ok(Arc::new(store))
}

/// Connect to NATS under the configured connection name.
pub async fn connect_bus(settings: &Settings) -> Result<Arc<dyn NotificationBus>, StartupError> {
    let bus = NatsBus::connect(
        settings.nats.url_str(),
        settings.nats.name(),
        settings.loader.connect_timeout,
    )
    .await?;
    tracing::info!(url = %settings.nats.url_str(), "Connected to NATS");
    Ok(Arc::new(bus))
}

/// Connect to Redis, then NATS.
pub async fn connect(settings: &Settings) -> Result<Backends, StartupError> {
    let store = connect_store(settings).await?;
    let bus = connect_bus(settings).await?;
    Ok(Backends { store, bus })
}
