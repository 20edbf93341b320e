//! Parsing helpers for individual configuration values.

use std::time::Duration;

use lta_core::BundleStatus;
use url::Url;

use crate::error::{ConfigError, ConfigResult};

fn invalid(key: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}

/// Interpret a flag value; `1`, `true`, `yes` and `on` are truthy, anything else is not.
#[must_use]
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Parse a non-negative, finite number of seconds (fractions allowed).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value is not a number or is
/// negative or non-finite.
pub fn parse_seconds(key: &'static str, value: &str) -> ConfigResult<Duration> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "not_a_number"))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| invalid(key, value, "not_a_duration"))
}

/// Parse a non-negative count.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value is not an unsigned integer.
pub fn parse_count(key: &'static str, value: &str) -> ConfigResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, value, "not_a_count"))
}

/// Parse an absolute `http`/`https` URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] when the value is not a URL or uses
/// another scheme.
pub fn parse_url(key: &'static str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value.trim()).map_err(|_| invalid(key, value, "not_a_url"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid(key, value, "unsupported_scheme")),
    }
}

/// Parse a bundle status label.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for unknown labels.
pub fn parse_status(key: &'static str, value: &str) -> ConfigResult<BundleStatus> {
    value
        .parse()
        .map_err(|_| invalid(key, value, "unknown_status"))
}

/// Require `to` to be a strictly later pipeline stage than `from`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTransition`] when the pair would move a bundle
/// backward, stand still, or target quarantine.
pub fn validate_transition(from: BundleStatus, to: BundleStatus) -> ConfigResult<()> {
    if from.is_forward(to) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
