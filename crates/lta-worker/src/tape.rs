//! Checked execution of tape commands and the tape namespace layout.

use std::sync::Arc;

use lta_core::{Bundle, CommandOutput, CommandRunner, LtaResult, Rejection, TapeCommand};
use lta_tape::{HsiToolkit, basename, join_tape_path, normalize_path};
use lta_telemetry::Metrics;
use tracing::{error, info, warn};

/// Where a bundle lives on tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeLayout {
    tape_base: String,
}

impl TapeLayout {
    /// Layout rooted at `tape_base`.
    #[must_use]
    pub fn new(tape_base: impl Into<String>) -> Self {
        Self {
            tape_base: tape_base.into(),
        }
    }

    /// Directory holding the archive: `normpath(tape_base/path)`.
    #[must_use]
    pub fn dest_dir(&self, bundle: &Bundle) -> String {
        join_tape_path(&[self.tape_base.as_str(), bundle.path.as_str()])
    }

    /// Archive location: `normpath(tape_base/path/basename(bundle_path))`.
    #[must_use]
    pub fn hpss_path(&self, bundle: &Bundle) -> String {
        join_tape_path(&[
            self.tape_base.as_str(),
            bundle.path.as_str(),
            basename(&bundle.bundle_path),
        ])
    }
}

/// Archive location on the staging side: `normpath(staging_base/basename(bundle_path))`.
#[must_use]
pub fn staging_path(staging_base: &str, bundle: &Bundle) -> String {
    normalize_path(&format!(
        "{staging_base}/{}",
        basename(&bundle.bundle_path)
    ))
}

/// Runs tape commands and turns non-zero exits into rejections.
#[derive(Clone)]
pub struct TapeSession {
    runner: Arc<dyn CommandRunner>,
    toolkit: HsiToolkit,
    metrics: Option<Metrics>,
}

impl TapeSession {
    /// Session running `toolkit` commands through `runner`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, toolkit: HsiToolkit) -> Self {
        Self {
            runner,
            toolkit,
            metrics: None,
        }
    }

    /// Count every command in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Command builders bound to the configured binaries.
    #[must_use]
    pub const fn toolkit(&self) -> &HsiToolkit {
        &self.toolkit
    }

    /// Run `hpss_avail archive`; `false` when it exits non-zero or cannot start.
    pub async fn probe(&self) -> bool {
        let command = self.toolkit.availability_probe();
        match self.runner.run(&command).await {
            Ok(output) if output.success() => {
                self.count(command.label, "ok");
                true
            }
            Ok(output) => {
                self.count(command.label, "failed");
                error!(
                    returncode = ?output.returncode,
                    "Unable to do work; HPSS system not available"
                );
                false
            }
            Err(err) => {
                self.count(command.label, "error");
                error!(error = %err, detail = %err.detail(), "Unable to do work; HPSS probe could not run");
                false
            }
        }
    }

    /// Run `command`; a non-zero exit becomes [`Rejection::CommandFailed`].
    ///
    /// The outer result carries failures to start the command at all.
    ///
    /// # Errors
    ///
    /// Returns an error when the runner cannot spawn the command.
    pub async fn run_checked(
        &self,
        command: &TapeCommand,
    ) -> LtaResult<Result<CommandOutput, Rejection>> {
        info!(command = %command, "running tape command");
        let output = match self.runner.run(command).await {
            Ok(output) => output,
            Err(err) => {
                self.count(command.label, "error");
                return Err(err);
            }
        };
        if output.success() {
            self.count(command.label, "ok");
            return Ok(Ok(output));
        }

        self.count(command.label, "failed");
        warn!(
            command = %command,
            returncode = ?output.returncode,
            stdout = %output.stdout,
            stderr = %output.stderr,
            "tape command failed"
        );
        Ok(Err(Rejection::CommandFailed {
            command: command.label,
            returncode: output.returncode,
        }))
    }

    fn count(&self, command: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_tape_command(command, outcome);
        }
    }
}
