//! Assembles a [`WorkerConfig`] from environment-style key lookups.

use std::time::Duration;

use lta_tape::{DEFAULT_HPSS_AVAIL_PATH, DEFAULT_HSI_PATH};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{Component, RetryPolicy, ServiceEndpoint, StageConfig, WorkerConfig};
use crate::validate::{
    parse_count, parse_flag, parse_seconds, parse_status, parse_url, validate_transition,
};

struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> ConfigResult<String> {
        self.optional(key).ok_or(ConfigError::Missing { key })
    }

    fn or_default(&self, key: &'static str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn seconds(&self, key: &'static str, default: f64) -> ConfigResult<Duration> {
        self.optional(key).map_or_else(
            || Ok(Duration::from_secs_f64(default)),
            |value| parse_seconds(key, &value),
        )
    }

    fn count(&self, key: &'static str, default: u32) -> ConfigResult<u32> {
        self.optional(key)
            .map_or(Ok(default), |value| parse_count(key, &value))
    }

    fn endpoint(&self, url_key: &'static str, token_key: &'static str) -> ConfigResult<ServiceEndpoint> {
        let url = parse_url(url_key, &self.required(url_key)?)?;
        let token = self.required(token_key)?;
        Ok(ServiceEndpoint { url, token })
    }
}

impl WorkerConfig {
    /// Load configuration for `component` from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required key is missing or a value is invalid.
    pub fn from_env(component: Component) -> ConfigResult<Self> {
        Self::from_lookup(component, |key| std::env::var(key).ok())
    }

    /// Load configuration for `component` through `lookup`.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a required key is missing, a value cannot
    /// be parsed, or the status pair would not move bundles forward.
    pub fn from_lookup<F>(component: Component, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source { lookup };
        let (default_input, default_output) = component.default_statuses();

        let input_status = source
            .optional("INPUT_STATUS")
            .map_or(Ok(default_input), |value| parse_status("INPUT_STATUS", &value))?;
        let output_status = source
            .optional("OUTPUT_STATUS")
            .map_or(Ok(default_output), |value| {
                parse_status("OUTPUT_STATUS", &value)
            })?;
        validate_transition(input_status, output_status)?;

        let stage = match component {
            Component::Writer => StageConfig::Writer {
                rse_base_path: source.required("RSE_BASE_PATH")?,
            },
            Component::Verifier => StageConfig::Verifier {
                file_catalog: source.endpoint("FILE_CATALOG_REST_URL", "FILE_CATALOG_REST_TOKEN")?,
            },
        };

        Ok(Self {
            component,
            component_name: source.required("COMPONENT_NAME")?,
            source_site: source.required("SOURCE_SITE")?,
            dest_site: source.required("DEST_SITE")?,
            input_status,
            output_status,
            lta_rest: source.endpoint("LTA_REST_URL", "LTA_REST_TOKEN")?,
            tape_base_path: source.required("TAPE_BASE_PATH")?,
            hsi_path: source.or_default("HSI_PATH", DEFAULT_HSI_PATH),
            hpss_avail_path: source.or_default("HPSS_AVAIL_PATH", DEFAULT_HPSS_AVAIL_PATH),
            work: RetryPolicy {
                retries: source.count("WORK_RETRIES", defaults::WORK_RETRIES)?,
                timeout: source.seconds("WORK_TIMEOUT_SECONDS", defaults::WORK_TIMEOUT_SECONDS)?,
            },
            heartbeat: RetryPolicy {
                retries: source.count(
                    "HEARTBEAT_PATCH_RETRIES",
                    defaults::HEARTBEAT_PATCH_RETRIES,
                )?,
                timeout: source.seconds(
                    "HEARTBEAT_PATCH_TIMEOUT_SECONDS",
                    defaults::HEARTBEAT_PATCH_TIMEOUT_SECONDS,
                )?,
            },
            work_sleep: source.seconds(
                "WORK_SLEEP_DURATION_SECONDS",
                defaults::WORK_SLEEP_DURATION_SECONDS,
            )?,
            heartbeat_sleep: source.seconds(
                "HEARTBEAT_SLEEP_DURATION_SECONDS",
                defaults::HEARTBEAT_SLEEP_DURATION_SECONDS,
            )?,
            run_once_and_die: parse_flag(source.optional("RUN_ONCE_AND_DIE").as_deref()),
            log_level: source.or_default("LOG_LEVEL", defaults::LOG_LEVEL),
            log_format: source.optional("LOG_FORMAT"),
            stage,
        })
    }
}
