//! Settings of the `envsync` binary.
//!
//! # Data Flow
//! ```text
//! process env + optional .env file
//!     → env::bootstrap_env
//!     → Settings::from_env (typed fields, per-field checks)
//!     → validation.rs (cross-field checks, all issues reported)
//!     → Settings (immutable for the life of the process)
//! ```
//!
//! # Design Decisions
//! - The binary's own settings go through the same materializer as the
//!   configs it serves
//! - Every key has a default so an empty environment is a valid local setup
//! - Validation separates per-field checks from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, SettingsError};
pub use schema::{LoaderSettings, NatsSettings, ObservabilitySettings, RedisSettings, Settings};
