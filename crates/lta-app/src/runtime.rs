//! Work loop and heartbeat task driving one claim loop for the process lifetime.
//!
//! # Design
//! - The work loop runs a cycle, then sleeps `work_sleep` unless shutdown is
//!   signalled. Outside run-once mode a failed cycle is logged and retried on
//!   the next wake-up.
//! - In run-once mode cycles repeat back to back until one claims nothing.
//! - The heartbeat reports the last work window and the counter snapshot to
//!   the coordinator every `heartbeat_sleep`; failures are logged only.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use lta_core::{ComponentStatus, Coordinator, now_timestamp};
use lta_telemetry::Metrics;
use lta_worker::{ArchiveStage, ClaimLoop};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};

/// Start and end of the most recent work cycle.
#[derive(Debug)]
pub struct WorkActivity {
    inner: Mutex<ActivityWindow>,
}

#[derive(Debug, Clone)]
struct ActivityWindow {
    begin: String,
    end: String,
}

impl WorkActivity {
    /// Both timestamps start at process start.
    #[must_use]
    pub fn new() -> Self {
        let now = now_timestamp();
        Self {
            inner: Mutex::new(ActivityWindow {
                begin: now.clone(),
                end: now,
            }),
        }
    }

    fn begin(&self) {
        self.lock().begin = now_timestamp();
    }

    fn end(&self) {
        self.lock().end = now_timestamp();
    }

    /// `(last_work_begin, last_work_end)` timestamps.
    #[must_use]
    pub fn window(&self) -> (String, String) {
        let window = self.lock().clone();
        (window.begin, window.end)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ActivityWindow> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WorkActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing and mode of the work loop.
#[derive(Debug, Clone, Copy)]
pub struct WorkSchedule {
    /// Pause between cycles.
    pub work_sleep: Duration,
    /// Exit after the first cycle that claims nothing.
    pub run_once_and_die: bool,
}

/// Drive `claim_loop` until shutdown or, in run-once mode, until idle.
///
/// # Errors
///
/// Returns an error when a cycle fails in run-once mode.
pub async fn run_work_loop<S>(
    claim_loop: &ClaimLoop<S>,
    schedule: WorkSchedule,
    activity: &WorkActivity,
    mut shutdown: watch::Receiver<bool>,
) -> AppResult<()>
where
    S: ArchiveStage,
{
    loop {
        if *shutdown.borrow() {
            info!("shutdown requested; leaving work loop");
            return Ok(());
        }

        activity.begin();
        let result = claim_loop.run_cycle().await;
        activity.end();

        match result {
            Ok(report) if schedule.run_once_and_die && report.claimed == 0 => {
                info!("Component completed one pass of work; exiting");
                return Ok(());
            }
            Ok(_) if schedule.run_once_and_die => continue,
            Ok(_) => {}
            Err(err) if schedule.run_once_and_die => {
                error!(error = %err, detail = %err.detail(), "work cycle failed");
                return Err(AppError::work("worker.run_cycle", err));
            }
            Err(err) => {
                error!(error = %err, detail = %err.detail(), "work cycle failed; retrying after sleep");
            }
        }

        tokio::select! {
            () = sleep(schedule.work_sleep) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("shutdown requested; leaving work loop");
                    return Ok(());
                }
            }
        }
    }
}

/// Who the heartbeat reports as.
#[derive(Debug, Clone)]
pub struct HeartbeatTarget {
    /// `/status/{component_type}`.
    pub component_type: &'static str,
    /// Key of this process under the component type.
    pub component_name: String,
}

/// PATCH one heartbeat; failures are logged and swallowed.
pub async fn send_heartbeat(
    coordinator: &dyn Coordinator,
    target: &HeartbeatTarget,
    activity: &WorkActivity,
    metrics: &Metrics,
) -> bool {
    let (begin, end) = activity.window();
    let status = ComponentStatus {
        timestamp: now_timestamp(),
        last_work_begin_timestamp: begin,
        last_work_end_timestamp: end,
        status: serde_json::to_value(metrics.snapshot()).unwrap_or_default(),
    };
    match coordinator
        .patch_status(target.component_type, &target.component_name, &status)
        .await
    {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, detail = %err.detail(), "heartbeat PATCH failed");
            false
        }
    }
}

/// Spawn the heartbeat task; it beats immediately and then every `interval`.
#[must_use]
pub fn spawn_heartbeat(
    coordinator: Arc<dyn Coordinator>,
    target: HeartbeatTarget,
    activity: Arc<WorkActivity>,
    metrics: Metrics,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            send_heartbeat(coordinator.as_ref(), &target, &activity, &metrics).await;
            tokio::select! {
                () = sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
