//! envsync: typed configuration from a Redis hash, kept live over NATS.

// Core
pub mod env;
pub mod reload;
pub mod remote;
pub mod bus;

// Binary support
pub mod config;
pub mod lifecycle;

// Cross-cutting concerns
pub mod error;
pub mod observability;
pub mod resilience;

pub use env::{materialize, EnvMap, EnvRecord, Field, MaterializeError};
pub use error::Error;
pub use reload::{LiveConfig, ReloadCoordinator, ReloadHandle, RemoteEnvLoader};
