//! # Design
//!
//! - Centralize process-level errors for bootstrap and the work loop.
//! - Keep error messages constant while carrying context fields for debugging.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: lta_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: lta_telemetry::TelemetryError,
    },
    /// A REST client could not be built.
    #[error("service client construction failed")]
    Client {
        /// Operation identifier.
        operation: &'static str,
        /// Source error.
        source: lta_core::LtaError,
    },
    /// A work cycle failed in run-once mode.
    #[error("work cycle failed")]
    Work {
        /// Operation identifier.
        operation: &'static str,
        /// Source error.
        source: lta_core::LtaError,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: lta_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: lta_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn client(operation: &'static str, source: lta_core::LtaError) -> Self {
        Self::Client { operation, source }
    }

    pub(crate) const fn work(operation: &'static str, source: lta_core::LtaError) -> Self {
        Self::Work { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn helpers_build_variants_with_sources() {
        let config = AppError::config(
            "config.load",
            lta_config::ConfigError::Missing { key: "LTA_REST_URL" },
        );
        assert!(matches!(
            config,
            AppError::Config {
                operation: "config.load",
                ..
            }
        ));
        assert!(config.source().is_some());

        let work = AppError::work(
            "worker.cycle",
            lta_core::LtaError::MissingChecksum { algorithm: "sha512" },
        );
        assert_eq!(work.to_string(), "work cycle failed");
        assert!(matches!(
            AppError::client(
                "client.lta",
                lta_core::LtaError::DeleteCountMismatch {
                    requested: 1,
                    deleted: 0
                }
            ),
            AppError::Client { .. }
        ));
    }
}
