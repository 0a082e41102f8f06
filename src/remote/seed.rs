//! Seed files: a TOML document flattened into a hash.
//!
//! Nested tables become dotted keys (`[a.b] c = 1` → `a.b.c = "1"`), arrays
//! of scalars become comma separated lists, everything else is rendered as
//! its plain string form.

use thiserror::Error;
use toml::{Table, Value};

use crate::env::EnvMap;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("invalid seed file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unsupported value for \"{key}\": {kind} cannot be stored in a flat hash")]
    Unsupported { key: String, kind: &'static str },
}

/// Parse a TOML seed document into a flat map.
pub fn env_map_from_toml(source: &str) -> Result<EnvMap, SeedError> {
    let table: Table = source.parse()?;
    let mut env = EnvMap::new();
    flatten(&table, None, &mut env)?;
    Ok(env)
}

fn flatten(table: &Table, prefix: Option<&str>, env: &mut EnvMap) -> Result<(), SeedError> {
    for (name, value) in table {
        let key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.clone(),
        };
        match value {
            Value::Table(nested) => flatten(nested, Some(&key), env)?,
            Value::Array(items) => {
                let rendered = items
                    .iter()
                    .map(|item| scalar(&key, item))
                    .collect::<Result<Vec<_>, _>>()?;
                env.insert(key, rendered.join(","));
            }
            other => {
                let rendered = scalar(&key, other)?;
                env.insert(key, rendered);
            }
        }
    }
    Ok(())
}

fn scalar(key: &str, value: &Value) -> Result<String, SeedError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(d) => Ok(d.to_string()),
        Value::Array(_) => Err(SeedError::Unsupported {
            key: key.to_string(),
            kind: "nested array",
        }),
        Value::Table(_) => Err(SeedError::Unsupported {
            key: key.to_string(),
            kind: "table inside array",
        }),
    }
}
