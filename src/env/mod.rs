//! Typed records from flat key/value environments.
//!
//! # Data Flow
//! ```text
//! process env / .env file ─┐
//!                          ├─→ EnvMap (key → raw string)
//! remote hash snapshot ────┘
//!     → EnvRecord::from_env (one Field per struct field)
//!     → typed record, or the first MaterializeError
//! ```
//!
//! # Design Decisions
//! - Records are built from scratch on every pass; nothing is patched in place
//! - The first failing field aborts the pass, no partial record is returned
//! - Materialization only reads the map

pub mod bootstrap;
pub mod error;
pub mod field;
pub mod value;

use std::collections::HashMap;

pub use bootstrap::{bootstrap_env, load_env, BootstrapError};
pub use error::MaterializeError;
pub use field::Field;
pub use value::FromEnvValue;

/// Flat environment: field key → raw value.
pub type EnvMap = HashMap<String, String>;

/// A configuration record that can be bound from an `EnvMap`.
///
/// ```
/// use envsync::env::{EnvMap, EnvRecord, Field, MaterializeError};
///
/// struct AppEnv {
///     a: String,
///     c: String,
/// }
///
/// impl EnvRecord for AppEnv {
///     fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
///         Ok(Self {
///             a: Field::new("a").required().read(env)?,
///             c: Field::new("c").default("c-default").read(env)?,
///         })
///     }
/// }
///
/// let env: EnvMap = [("a".to_string(), "x".to_string())].into_iter().collect();
/// let record: AppEnv = envsync::env::materialize(&env).unwrap();
/// assert_eq!(record.a, "x");
/// assert_eq!(record.c, "c-default");
/// ```
pub trait EnvRecord: Sized + Send + Sync + 'static {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError>;
}

/// Bind `env` onto a fresh `T`.
pub fn materialize<T: EnvRecord>(env: &EnvMap) -> Result<T, MaterializeError> {
    T::from_env(env)
}

/// Every entry of `base`, overridden by the entries of `overlay`.
pub fn merge(base: &EnvMap, overlay: EnvMap) -> EnvMap {
    let mut merged = base.clone();
    merged.extend(overlay);
    merged
}
