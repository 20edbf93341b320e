//! Fallback values applied when optional keys are unset.

pub(crate) const WORK_RETRIES: u32 = 3;
pub(crate) const WORK_TIMEOUT_SECONDS: f64 = 30.0;
pub(crate) const WORK_SLEEP_DURATION_SECONDS: f64 = 60.0;
pub(crate) const HEARTBEAT_PATCH_RETRIES: u32 = 3;
pub(crate) const HEARTBEAT_PATCH_TIMEOUT_SECONDS: f64 = 30.0;
pub(crate) const HEARTBEAT_SLEEP_DURATION_SECONDS: f64 = 60.0;
pub(crate) const LOG_LEVEL: &str = "info";
