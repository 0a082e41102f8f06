//! Per-field declarations.
//!
//! A `Field` carries what a struct tag would carry elsewhere: the source
//! key, whether the key is required, a raw default and an optional
//! validation rule. Records build one per struct field inside
//! `EnvRecord::from_env` and call `read`.

use std::fmt;

use crate::env::error::MaterializeError;
use crate::env::value::FromEnvValue;
use crate::env::EnvMap;

/// Declaration of a single record field.
pub struct Field<T> {
    key: &'static str,
    required: bool,
    not_empty: bool,
    default: Option<&'static str>,
    check: Option<fn(&T) -> bool>,
}

impl<T: FromEnvValue> Field<T> {
    /// Declare an optional field read from `key`.
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            required: false,
            not_empty: false,
            default: None,
            check: None,
        }
    }

    /// The key must be present in the map.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// A present value must not be the empty string.
    pub fn not_empty(mut self) -> Self {
        self.not_empty = true;
        self
    }

    /// Raw value used when the key is absent. Converted like a present value.
    pub fn default(mut self, raw: &'static str) -> Self {
        self.default = Some(raw);
        self
    }

    /// Reject converted values for which `check` returns false.
    pub fn validate(mut self, check: fn(&T) -> bool) -> Self {
        self.check = Some(check);
        self
    }

    /// The source key.
    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Resolve this field against `env`.
    pub fn read(&self, env: &EnvMap) -> Result<T, MaterializeError> {
        let raw = match env.get(self.key) {
            Some(raw) => raw.as_str(),
            None if self.required => {
                return Err(MaterializeError::MissingRequiredField {
                    key: self.key.to_string(),
                })
            }
            None => match self.default {
                Some(raw) => raw,
                None => return Ok(T::default()),
            },
        };

        if self.not_empty && raw.is_empty() {
            return Err(self.invalid(raw));
        }

        let value = T::from_env_value(raw).map_err(|reason| MaterializeError::TypeConversion {
            key: self.key.to_string(),
            raw: raw.to_string(),
            target: T::TYPE_NAME,
            reason,
        })?;

        match self.check {
            Some(check) if !check(&value) => Err(self.invalid(raw)),
            _ => Ok(value),
        }
    }

    fn invalid(&self, raw: &str) -> MaterializeError {
        MaterializeError::Validation {
            key: self.key.to_string(),
            raw: raw.to_string(),
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("key", &self.key)
            .field("required", &self.required)
            .field("not_empty", &self.not_empty)
            .field("default", &self.default)
            .field("validated", &self.check.is_some())
            .finish()
    }
}
