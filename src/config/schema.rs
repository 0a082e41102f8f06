//! Settings schema.
//!
//! Each section is its own `EnvRecord` reading flat, upper-case keys, so
//! sections can be loaded on their own in tests.

use std::time::Duration;

use url::Url;

use crate::config::validation::{is_log_level, is_nats_scheme};
use crate::env::{EnvMap, EnvRecord, Field, MaterializeError};

/// Root settings of the binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub redis: RedisSettings,
    pub nats: NatsSettings,
    pub loader: LoaderSettings,
    pub observability: ObservabilitySettings,
}

impl EnvRecord for Settings {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
        Ok(Self {
            redis: RedisSettings::from_env(env)?,
            nats: NatsSettings::from_env(env)?,
            loader: LoaderSettings::from_env(env)?,
            observability: ObservabilitySettings::from_env(env)?,
        })
    }
}

/// Redis connection.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    /// `REDIS_HOST`
    pub host: String,
    /// `REDIS_PORT`
    pub port: u16,
    /// `REDIS_PASS`, empty for no authentication.
    pub password: String,
    /// `REDIS_DB`
    pub db: i64,
}

impl EnvRecord for RedisSettings {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
        Ok(Self {
            host: Field::new("REDIS_HOST").default("localhost").not_empty().read(env)?,
            port: Field::new("REDIS_PORT").default("6379").validate(|p| *p != 0).read(env)?,
            password: Field::new("REDIS_PASS").read(env)?,
            db: Field::new("REDIS_DB").default("0").validate(|db| *db >= 0).read(env)?,
        })
    }
}

impl RedisSettings {
    /// `redis://[:password@]host:port/db`
    pub fn connection_url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))?;
        if !self.password.is_empty() {
            // Only fails for URLs that cannot carry credentials; redis:// can.
            let _ = url.set_password(Some(&self.password));
        }
        Ok(url)
    }
}

/// NATS connection.
#[derive(Debug, Clone)]
pub struct NatsSettings {
    /// `NATS_URL`
    pub url: Option<Url>,
    /// `NATS_NAME`, the connection name shown by the server.
    pub name: String,
}

impl EnvRecord for NatsSettings {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
        Ok(Self {
            url: Field::new("NATS_URL")
                .default("nats://127.0.0.1:4222")
                .validate(|url: &Option<Url>| url.as_ref().is_some_and(|u| is_nats_scheme(u.scheme())))
                .read(env)?,
            name: Field::new("NATS_NAME").read(env)?,
        })
    }
}

impl NatsSettings {
    pub fn url_str(&self) -> &str {
        self.url.as_ref().map(Url::as_str).unwrap_or_default()
    }

    pub fn name(&self) -> Option<&str> {
        Some(self.name.as_str()).filter(|name| !name.is_empty())
    }
}

/// Remote loading and reload behavior.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// `ENVSYNC_FETCH_TIMEOUT`
    pub fetch_timeout: Duration,
    /// `ENVSYNC_CONNECT_TIMEOUT`
    pub connect_timeout: Duration,
    /// `ENVSYNC_SUBJECT_ROOT`
    pub subject_root: String,
    /// `ENVSYNC_ERROR_AT_NOT_FOUND`
    pub error_at_not_found: bool,
}

impl EnvRecord for LoaderSettings {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
        Ok(Self {
            fetch_timeout: Field::new("ENVSYNC_FETCH_TIMEOUT").default("3s").read(env)?,
            connect_timeout: Field::new("ENVSYNC_CONNECT_TIMEOUT").default("10s").read(env)?,
            subject_root: Field::new("ENVSYNC_SUBJECT_ROOT").default("reload").read(env)?,
            error_at_not_found: Field::new("ENVSYNC_ERROR_AT_NOT_FOUND").default("false").read(env)?,
        })
    }
}

/// Logging and metrics.
#[derive(Debug, Clone)]
pub struct ObservabilitySettings {
    /// `LOG_LEVEL`
    pub log_level: String,
    /// `LOG_FORMAT`
    pub log_format: String,
    /// `METRICS_ADDRESS`, empty disables the exporter.
    pub metrics_address: String,
}

impl EnvRecord for ObservabilitySettings {
    fn from_env(env: &EnvMap) -> Result<Self, MaterializeError> {
        Ok(Self {
            log_level: Field::new("LOG_LEVEL")
                .default("info")
                .validate(|level: &String| is_log_level(level))
                .read(env)?,
            log_format: Field::new("LOG_FORMAT").default("pretty").read(env)?,
            metrics_address: Field::new("METRICS_ADDRESS").read(env)?,
        })
    }
}
