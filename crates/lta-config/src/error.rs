//! Error types for configuration loading.

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Primary error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key was not set.
    #[error("required configuration key missing")]
    Missing {
        /// Environment key.
        key: &'static str,
    },
    /// A key held a value that could not be parsed.
    #[error("invalid configuration value")]
    InvalidValue {
        /// Environment key.
        key: &'static str,
        /// Offending value.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// The configured status pair would not move bundles forward.
    #[error("invalid status transition")]
    InvalidTransition {
        /// Configured input status.
        from: String,
        /// Configured output status.
        to: String,
    },
}

impl ConfigError {
    /// Environment key the error refers to, when there is one.
    #[must_use]
    pub const fn key(&self) -> Option<&'static str> {
        match self {
            Self::Missing { key } | Self::InvalidValue { key, .. } => Some(key),
            Self::InvalidTransition { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_constant_and_keys_exposed() {
        let missing = ConfigError::Missing { key: "DEST_SITE" };
        assert_eq!(missing.to_string(), "required configuration key missing");
        assert_eq!(missing.key(), Some("DEST_SITE"));

        let transition = ConfigError::InvalidTransition {
            from: "verifying".into(),
            to: "taping".into(),
        };
        assert_eq!(transition.to_string(), "invalid status transition");
        assert_eq!(transition.key(), None);
    }
}
