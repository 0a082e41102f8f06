//! Settings validation.
//!
//! # Responsibilities
//! - Field predicates used by the schema
//! - Cross-field and semantic checks after materialization
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>
//! - Runs before any connection is opened

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::bus::subject::is_literal_token;
use crate::config::schema::Settings;
use crate::observability::logging::LogFormat;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One semantic problem with the settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub key: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

pub fn is_log_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
}

pub fn is_nats_scheme(scheme: &str) -> bool {
    matches!(scheme, "nats" | "tls")
}

/// Check everything a single field rule cannot.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.loader.fetch_timeout == Duration::ZERO {
        errors.push(ValidationError::new("ENVSYNC_FETCH_TIMEOUT", "must be greater than zero"));
    }
    if settings.loader.connect_timeout == Duration::ZERO {
        errors.push(ValidationError::new("ENVSYNC_CONNECT_TIMEOUT", "must be greater than zero"));
    }
    if !is_literal_token(&settings.loader.subject_root) {
        errors.push(ValidationError::new(
            "ENVSYNC_SUBJECT_ROOT",
            format!("{:?} is not a single subject token", settings.loader.subject_root),
        ));
    }
    if let Err(e) = settings.observability.log_format.parse::<LogFormat>() {
        errors.push(ValidationError::new("LOG_FORMAT", e));
    }
    let metrics_address = &settings.observability.metrics_address;
    if !metrics_address.is_empty() && metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "METRICS_ADDRESS",
            format!("{:?} is not a socket address", metrics_address),
        ));
    }
    if let Err(e) = settings.redis.connection_url() {
        errors.push(ValidationError::new("REDIS_HOST", format!("cannot build connection URL: {}", e)));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
