//! Prometheus-backed worker counters and snapshot helpers.
//!
//! # Design
//! - Counters are only read back through [`Metrics::snapshot`], which the
//!   heartbeat embeds as the component status.
//! - Exposes the counters an operator needs to triage a tape worker: claims,
//!   outcomes, tape command results and metadata reconciliation volume.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use prometheus::{IntCounter, IntCounterVec, Opts};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed counters shared by the worker tasks.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    bundles_claimed_total: IntCounter,
    bundles_completed_total: IntCounter,
    bundles_quarantined_total: IntCounter,
    bundles_failed_total: IntCounter,
    preflight_failures_total: IntCounter,
    work_cycles_total: IntCounter,
    metadata_reconciled_total: IntCounter,
    tape_commands_total: IntCounterVec,
    tape_command_labels: Mutex<BTreeSet<(String, String)>>,
}

/// Snapshot of the counters, embedded in heartbeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Bundles popped from the coordinator.
    pub bundles_claimed_total: u64,
    /// Bundles advanced to the output status.
    pub bundles_completed_total: u64,
    /// Bundles quarantined after a tape step refused them.
    pub bundles_quarantined_total: u64,
    /// Bundles quarantined after an unexpected failure.
    pub bundles_failed_total: u64,
    /// Claim attempts skipped because HPSS was unavailable.
    pub preflight_failures_total: u64,
    /// Completed work cycles.
    pub work_cycles_total: u64,
    /// Metadata records whose catalog location was recorded and which were deleted.
    pub metadata_reconciled_total: u64,
    /// Tape commands run, by command label and then outcome.
    pub tape_commands: BTreeMap<String, BTreeMap<String, u64>>,
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

impl Metrics {
    /// Construct the worker counters.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built.
    pub fn new() -> Result<Self> {
        let bundles_claimed_total =
            counter("bundles_claimed_total", "Bundles claimed from the LTA DB")?;
        let bundles_completed_total = counter(
            "bundles_completed_total",
            "Bundles advanced to the output status",
        )?;
        let bundles_quarantined_total = counter(
            "bundles_quarantined_total",
            "Bundles quarantined by a failed tape step",
        )?;
        let bundles_failed_total = counter(
            "bundles_failed_total",
            "Bundles quarantined by an unexpected failure",
        )?;
        let preflight_failures_total = counter(
            "preflight_failures_total",
            "Claim attempts skipped because HPSS was unavailable",
        )?;
        let work_cycles_total = counter("work_cycles_total", "Completed work cycles")?;
        let metadata_reconciled_total = counter(
            "metadata_reconciled_total",
            "Metadata records reconciled into the File Catalog",
        )?;
        let tape_commands_total = IntCounterVec::new(
            Opts::new("tape_commands_total", "Tape commands executed by outcome"),
            &["command", "outcome"],
        )
        .map_err(|source| TelemetryError::MetricsCollector {
            name: "tape_commands_total",
            source,
        })?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                bundles_claimed_total,
                bundles_completed_total,
                bundles_quarantined_total,
                bundles_failed_total,
                preflight_failures_total,
                work_cycles_total,
                metadata_reconciled_total,
                tape_commands_total,
                tape_command_labels: Mutex::default(),
            }),
        })
    }

    /// Count a bundle claimed from the coordinator.
    pub fn inc_claimed(&self) {
        self.inner.bundles_claimed_total.inc();
    }

    /// Count a bundle advanced to its output status.
    pub fn inc_completed(&self) {
        self.inner.bundles_completed_total.inc();
    }

    /// Count a bundle quarantined by a tape step.
    pub fn inc_quarantined(&self) {
        self.inner.bundles_quarantined_total.inc();
    }

    /// Count a bundle quarantined by an unexpected failure.
    pub fn inc_failed(&self) {
        self.inner.bundles_failed_total.inc();
    }

    /// Count a claim attempt skipped by the availability probe.
    pub fn inc_preflight_failure(&self) {
        self.inner.preflight_failures_total.inc();
    }

    /// Count a finished work cycle.
    pub fn inc_work_cycle(&self) {
        self.inner.work_cycles_total.inc();
    }

    /// Add reconciled metadata records.
    pub fn add_metadata_reconciled(&self, count: u64) {
        self.inner.metadata_reconciled_total.inc_by(count);
    }

    /// Count a tape command by label and outcome (`ok`, `failed`, `error`).
    pub fn inc_tape_command(&self, command: &str, outcome: &str) {
        self.inner
            .tape_commands_total
            .with_label_values(&[command, outcome])
            .inc();
        self.inner
            .tape_command_labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((command.to_string(), outcome.to_string()));
    }

    fn tape_commands(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        let labels = self
            .inner
            .tape_command_labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut commands: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        for (command, outcome) in labels {
            let count = self
                .inner
                .tape_commands_total
                .with_label_values(&[command.as_str(), outcome.as_str()])
                .get();
            commands.entry(command).or_default().insert(outcome, count);
        }
        commands
    }

    /// Take a point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bundles_claimed_total: self.inner.bundles_claimed_total.get(),
            bundles_completed_total: self.inner.bundles_completed_total.get(),
            bundles_quarantined_total: self.inner.bundles_quarantined_total.get(),
            bundles_failed_total: self.inner.bundles_failed_total.get(),
            preflight_failures_total: self.inner.preflight_failures_total.get(),
            work_cycles_total: self.inner.work_cycles_total.get(),
            metadata_reconciled_total: self.inner.metadata_reconciled_total.get(),
            tape_commands: self.tape_commands(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_feed_snapshot() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_claimed();
        metrics.inc_claimed();
        metrics.inc_completed();
        metrics.inc_quarantined();
        metrics.inc_failed();
        metrics.inc_preflight_failure();
        metrics.inc_work_cycle();
        metrics.add_metadata_reconciled(1500);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bundles_claimed_total, 2);
        assert_eq!(snapshot.bundles_completed_total, 1);
        assert_eq!(snapshot.bundles_quarantined_total, 1);
        assert_eq!(snapshot.bundles_failed_total, 1);
        assert_eq!(snapshot.preflight_failures_total, 1);
        assert_eq!(snapshot.work_cycles_total, 1);
        assert_eq!(snapshot.metadata_reconciled_total, 1500);
        Ok(())
    }

    #[test]
    fn snapshot_groups_tape_commands_by_outcome() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        assert!(metrics.snapshot().tape_commands.is_empty());

        metrics.inc_tape_command("hsi put", "ok");
        metrics.inc_tape_command("hsi put", "failed");
        metrics.inc_tape_command("hsi put", "failed");
        metrics.inc_tape_command("hpss_avail", "ok");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tape_commands["hsi put"]["failed"], 2);
        assert_eq!(snapshot.tape_commands["hsi put"]["ok"], 1);
        assert_eq!(snapshot.tape_commands["hpss_avail"].len(), 1);

        let status = serde_json::to_value(&snapshot)?;
        assert_eq!(status["tape_commands"]["hsi put"]["failed"], 2);
        Ok(())
    }
}
