//! Crate-level error type.

use thiserror::Error;

use crate::bus::BusError;
use crate::env::{BootstrapError, MaterializeError};
use crate::remote::FetchError;

/// Errors surfaced to callers of the initial load and subscription setup.
///
/// Errors on the reload path never reach the caller; they are logged and
/// sent back to whoever triggered the reload.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("reload subscription for project \"{project}\" and key \"{key}\" already exists")]
    AlreadySubscribed { project: String, key: String },

    #[error("invalid project name {0:?}: must be a single subject token")]
    InvalidProject(String),
}
