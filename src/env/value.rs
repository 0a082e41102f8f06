//! Conversion of raw environment strings into typed field values.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// A type a single environment value can be converted into.
///
/// `Default` supplies the zero value used when a field is absent, optional
/// and has no declared default.
pub trait FromEnvValue: Sized + Default {
    /// Human readable type name used in conversion errors.
    const TYPE_NAME: &'static str;

    /// Convert a raw value, returning the reason on failure.
    fn from_env_value(raw: &str) -> Result<Self, String>;
}

impl FromEnvValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_env_value(raw: &str) -> Result<Self, String> {
        Ok(raw.to_string())
    }
}

impl FromEnvValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_env_value(raw: &str) -> Result<Self, String> {
        match raw {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err("expected one of 1/t/true or 0/f/false".to_string()),
        }
    }
}

macro_rules! from_str_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromEnvValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_env_value(raw: &str) -> Result<Self, String> {
                    raw.trim().parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

from_str_value! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
}

impl FromEnvValue for Duration {
    const TYPE_NAME: &'static str = "duration";

    fn from_env_value(raw: &str) -> Result<Self, String> {
        humantime::parse_duration(raw.trim()).map_err(|e| e.to_string())
    }
}

impl FromEnvValue for PathBuf {
    const TYPE_NAME: &'static str = "path";

    fn from_env_value(raw: &str) -> Result<Self, String> {
        Ok(PathBuf::from(raw))
    }
}

/// `Url` has no `Default`, so it is only usable behind `Option`.
impl FromEnvValue for Option<Url> {
    const TYPE_NAME: &'static str = "url";

    fn from_env_value(raw: &str) -> Result<Self, String> {
        Url::parse(raw.trim()).map(Some).map_err(|e| e.to_string())
    }
}

/// Comma separated list. An empty value is an empty list.
impl<T: FromEnvValue> FromEnvValue for Vec<T> {
    const TYPE_NAME: &'static str = "list";

    fn from_env_value(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(',')
            .enumerate()
            .map(|(i, item)| {
                T::from_env_value(item.trim())
                    .map_err(|e| format!("item {} ({:?}) is not a valid {}: {}", i, item, T::TYPE_NAME, e))
            })
            .collect()
    }
}
