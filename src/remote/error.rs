//! Remote fetch errors.

use std::fmt;

use crate::resilience::timeouts::DeadlineExceeded;

/// Outcome of a failed remote fetch.
///
/// `NotFound` is a normal answer from the store; whether it is fatal is up
/// to the caller. `Transport` covers network and protocol failures as well
/// as an expired deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The hash (or the named field of it) does not exist.
    NotFound { key: String, field: Option<String> },
    /// The store could not be reached or answered garbage.
    Transport { reason: String },
}

impl FetchError {
    pub fn not_found(key: &str, field: Option<&str>) -> Self {
        FetchError::NotFound {
            key: key.to_string(),
            field: field.map(str::to_string),
        }
    }

    pub fn transport(reason: impl fmt::Display) -> Self {
        FetchError::Transport {
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound { key, field: None } => write!(f, "key[{}] not found", key),
            FetchError::NotFound { key, field: Some(field) } => {
                write!(f, "key[{}]->field[{}] not found", key, field)
            }
            FetchError::Transport { reason } => write!(f, "transport error: {}", reason),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<DeadlineExceeded> for FetchError {
    fn from(e: DeadlineExceeded) -> Self {
        FetchError::transport(e)
    }
}

impl From<::redis::RedisError> for FetchError {
    fn from(e: ::redis::RedisError) -> Self {
        FetchError::transport(e)
    }
}
