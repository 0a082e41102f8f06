//! Bootstrap environment from the process and an optional `.env` file.
//!
//! The process environment is never modified: `.env` entries are read into
//! the map and process variables are layered on top, so a variable exported
//! by the shell always wins over the file.

use std::ffi::OsString;
use std::path::Path;
use thiserror::Error;

use crate::env::{materialize, EnvMap, EnvRecord, MaterializeError};

const DEFAULT_DOTENV: &str = ".env";

/// Errors from the bootstrap load.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read env file {path}: {source}")]
    DotEnv {
        path: String,
        #[source]
        source: dotenvy::Error,
    },

    #[error(transparent)]
    Materialize(#[from] MaterializeError),
}

/// Collect the bootstrap map.
///
/// With `dotenv = None` a `.env` in the working directory is used when it
/// exists. An explicitly named file must exist.
pub fn bootstrap_env(dotenv: Option<&Path>) -> Result<EnvMap, BootstrapError> {
    let mut env = match dotenv {
        Some(path) => read_dotenv(path)?,
        None => match read_dotenv(Path::new(DEFAULT_DOTENV)) {
            Ok(env) => env,
            Err(BootstrapError::DotEnv { source, .. }) if source.not_found() => EnvMap::new(),
            Err(e) => return Err(e),
        },
    };

    let before = env.len();
    let skipped = overlay_process_env(&mut env, std::env::vars_os());
    tracing::debug!(dotenv_entries = before, total = env.len(), skipped, "Bootstrap environment collected");
    Ok(env)
}

/// Layer process variables onto `env`. Entries that are not valid UTF-8 are
/// skipped and counted.
fn overlay_process_env(env: &mut EnvMap, vars: impl Iterator<Item = (OsString, OsString)>) -> usize {
    let mut skipped = 0;
    for (key, value) in vars {
        match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => {
                env.insert(key, value);
            }
            (key, _) => {
                skipped += 1;
                let key = key.unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
                tracing::warn!(key = %key, "Skipping process variable that is not valid UTF-8");
            }
        }
    }
    skipped
}

/// Materialize `T` from the bootstrap map.
pub fn load_env<T: EnvRecord>(dotenv: Option<&Path>) -> Result<T, BootstrapError> {
    let env = bootstrap_env(dotenv)?;
    Ok(materialize(&env)?)
}

fn read_dotenv(path: &Path) -> Result<EnvMap, BootstrapError> {
    let wrap = |source| BootstrapError::DotEnv {
        path: path.display().to_string(),
        source,
    };
    dotenvy::from_path_iter(path)
        .map_err(wrap)?
        .map(|item| item.map_err(wrap))
        .collect()
}
