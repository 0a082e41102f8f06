//! Materialization errors.

use thiserror::Error;

/// Why a flat environment map could not be bound onto a record.
///
/// Materialization stops at the first failing field, so exactly one of
/// these is reported per pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterializeError {
    /// A field marked required has no entry in the map.
    #[error("required field \"{key}\" is not set")]
    MissingRequiredField { key: String },

    /// The raw value could not be converted to the field's type.
    #[error("field \"{key}\": cannot parse {raw:?} as {target}: {reason}")]
    TypeConversion {
        key: String,
        raw: String,
        target: &'static str,
        reason: String,
    },

    /// The converted value was rejected by the field's validation rule.
    #[error("field \"{key}\": value {raw:?} failed validation")]
    Validation { key: String, raw: String },
}

impl MaterializeError {
    /// The key of the field that failed.
    pub fn key(&self) -> &str {
        match self {
            MaterializeError::MissingRequiredField { key }
            | MaterializeError::TypeConversion { key, .. }
            | MaterializeError::Validation { key, .. } => key,
        }
    }
}
