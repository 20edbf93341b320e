//! Typed worker configuration.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use lta_core::{BundleStatus, PopQuery};
use tracing::info;
use url::Url;

const REDACTED: &str = "[redacted]";

/// Which tape worker a process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Writes bundles to tape.
    Writer,
    /// Verifies tape copies and records them in the catalog.
    Verifier,
}

impl Component {
    /// Component type used for heartbeat reporting (`/status/{type}`).
    #[must_use]
    pub const fn status_type(self) -> &'static str {
        match self {
            Self::Writer => "nersc_mover",
            Self::Verifier => "nersc_verifier",
        }
    }

    /// Component type recorded on every log event.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Writer => "NerscMover",
            Self::Verifier => "NerscVerifier",
        }
    }

    /// Status pair applied when `INPUT_STATUS`/`OUTPUT_STATUS` are unset.
    #[must_use]
    pub const fn default_statuses(self) -> (BundleStatus, BundleStatus) {
        match self {
            Self::Writer => (BundleStatus::Taping, BundleStatus::Verifying),
            Self::Verifier => (BundleStatus::Verifying, BundleStatus::Completed),
        }
    }
}

impl Display for Component {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Writer => "writer",
            Self::Verifier => "verifier",
        })
    }
}

/// Timeout and retry budget for one family of REST calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Base URL and bearer token of a REST service.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Service base URL.
    pub url: Url,
    /// Bearer token.
    pub token: String,
}

impl fmt::Debug for ServiceEndpoint {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceEndpoint")
            .field("url", &self.url.as_str())
            .field("token", &REDACTED)
            .finish()
    }
}

/// Settings only one of the workers needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageConfig {
    /// Archive writer settings.
    Writer {
        /// Directory holding the archives to be written (`RSE_BASE_PATH`).
        rse_base_path: String,
    },
    /// Archive verifier settings.
    Verifier {
        /// File Catalog service.
        file_catalog: ServiceEndpoint,
    },
}

/// Fully validated configuration for one worker process.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Worker kind.
    pub component: Component,
    /// Operator-chosen instance name (`COMPONENT_NAME`).
    pub component_name: String,
    /// Site that produced the bundles.
    pub source_site: String,
    /// Site that archives the bundles.
    pub dest_site: String,
    /// Status of bundles this worker claims.
    pub input_status: BundleStatus,
    /// Status bundles advance to on success.
    pub output_status: BundleStatus,
    /// LTA DB service.
    pub lta_rest: ServiceEndpoint,
    /// Root of the archive namespace in HPSS.
    pub tape_base_path: String,
    /// `hsi` binary.
    pub hsi_path: String,
    /// `hpss_avail` binary.
    pub hpss_avail_path: String,
    /// Budget for calls made while working on a bundle.
    pub work: RetryPolicy,
    /// Budget for heartbeat calls.
    pub heartbeat: RetryPolicy,
    /// Pause between work cycles.
    pub work_sleep: Duration,
    /// Pause between heartbeats.
    pub heartbeat_sleep: Duration,
    /// Exit once a cycle claims nothing.
    pub run_once_and_die: bool,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Requested log format name, if any.
    pub log_format: Option<String>,
    /// Worker-specific settings.
    pub stage: StageConfig,
}

impl WorkerConfig {
    /// Pop scope for this worker.
    #[must_use]
    pub fn pop_query(&self) -> PopQuery {
        PopQuery {
            source: self.source_site.clone(),
            dest: self.dest_site.clone(),
            status: self.input_status,
        }
    }

    /// Key/value pairs describing the loaded configuration, tokens redacted.
    #[must_use]
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("COMPONENT_NAME", self.component_name.clone()),
            ("SOURCE_SITE", self.source_site.clone()),
            ("DEST_SITE", self.dest_site.clone()),
            ("INPUT_STATUS", self.input_status.to_string()),
            ("OUTPUT_STATUS", self.output_status.to_string()),
            ("LTA_REST_URL", self.lta_rest.url.to_string()),
            ("LTA_REST_TOKEN", REDACTED.to_string()),
            ("TAPE_BASE_PATH", self.tape_base_path.clone()),
            ("HSI_PATH", self.hsi_path.clone()),
            ("HPSS_AVAIL_PATH", self.hpss_avail_path.clone()),
            ("WORK_RETRIES", self.work.retries.to_string()),
            (
                "WORK_TIMEOUT_SECONDS",
                self.work.timeout.as_secs_f64().to_string(),
            ),
            (
                "WORK_SLEEP_DURATION_SECONDS",
                self.work_sleep.as_secs_f64().to_string(),
            ),
            ("HEARTBEAT_PATCH_RETRIES", self.heartbeat.retries.to_string()),
            (
                "HEARTBEAT_PATCH_TIMEOUT_SECONDS",
                self.heartbeat.timeout.as_secs_f64().to_string(),
            ),
            (
                "HEARTBEAT_SLEEP_DURATION_SECONDS",
                self.heartbeat_sleep.as_secs_f64().to_string(),
            ),
            ("RUN_ONCE_AND_DIE", self.run_once_and_die.to_string()),
            ("LOG_LEVEL", self.log_level.clone()),
        ];
        match &self.stage {
            StageConfig::Writer { rse_base_path } => {
                pairs.push(("RSE_BASE_PATH", rse_base_path.clone()));
            }
            StageConfig::Verifier { file_catalog } => {
                pairs.push(("FILE_CATALOG_REST_URL", file_catalog.url.to_string()));
                pairs.push(("FILE_CATALOG_REST_TOKEN", REDACTED.to_string()));
            }
        }
        pairs
    }

    /// Log the loaded configuration, one event per key.
    pub fn log_summary(&self) {
        info!(component = %self.component, "configuration loaded");
        for (key, value) in self.summary() {
            info!(key, value = %value, "configuration value");
        }
    }
}
