//! Settings loading.

use std::path::Path;

use thiserror::Error;

use crate::config::schema::Settings;
use crate::config::validation::{validate_settings, ValidationError};
use crate::env::{load_env, BootstrapError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("invalid settings: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load and validate settings from the process environment and `.env`.
pub fn load_settings(dotenv: Option<&Path>) -> Result<Settings, SettingsError> {
    let settings: Settings = load_env(dotenv)?;
    validate_settings(&settings).map_err(SettingsError::Validation)?;
    Ok(settings)
}
