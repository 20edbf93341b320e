//! Claim-execute-transition loop shared by every tape worker.
//!
//! # Design
//! - A cycle claims one bundle at a time until the coordinator runs dry, the
//!   tape system is unavailable, or a bundle fails unexpectedly.
//! - The loop owns every status transition. Stages report `Done` or a
//!   `Rejection`; rejections and errors both end in a quarantine PATCH carrying
//!   the claimant and reason.
//! - Quarantine PATCHes are best-effort: a failure is logged and the bundle is
//!   left for operators to find by its stale claim.

use std::sync::Arc;

use chrono::Utc;
use lta_core::{
    Bundle, BundlePatch, BundleStatus, Claimant, Coordinator, LtaError, LtaResult, PopQuery,
    PoppedBundle, StageOutcome,
};
use lta_telemetry::Metrics;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::stage::ArchiveStage;

/// Identity and status scope of a claim loop.
#[derive(Debug, Clone)]
pub struct ClaimSettings {
    /// Identity recorded on claimed and quarantined bundles.
    pub claimant: Claimant,
    /// Which bundles to claim.
    pub query: PopQuery,
    /// Status a successfully processed bundle advances to.
    pub output_status: BundleStatus,
}

/// Result of one claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The tape system is unavailable; nothing was claimed.
    Unavailable,
    /// The coordinator had no bundle to hand out.
    NoWork,
    /// The bundle advanced to the output status.
    Completed(Uuid),
    /// A tape step rejected the bundle and it was quarantined.
    Quarantined(Uuid),
    /// Processing failed unexpectedly and the bundle was quarantined.
    Failed(Uuid),
}

/// Why a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No more work in the input status.
    NoWork,
    /// The tape system became unavailable.
    Unavailable,
    /// A bundle failed unexpectedly.
    Failed,
}

/// Tally of one work cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Bundles claimed.
    pub claimed: usize,
    /// Bundles advanced.
    pub completed: usize,
    /// Bundles quarantined after a rejection.
    pub quarantined: usize,
    /// Bundles quarantined after an error.
    pub failed: usize,
    /// Why the cycle ended.
    pub stop: StopReason,
}

/// Claims bundles from the coordinator and drives them through a stage.
pub struct ClaimLoop<S> {
    stage: S,
    coordinator: Arc<dyn Coordinator>,
    settings: ClaimSettings,
    metrics: Option<Metrics>,
}

impl<S> ClaimLoop<S>
where
    S: ArchiveStage,
{
    /// Loop driving `stage` against `coordinator`.
    #[must_use]
    pub fn new(stage: S, coordinator: Arc<dyn Coordinator>, settings: ClaimSettings) -> Self {
        Self {
            stage,
            coordinator,
            settings,
            metrics: None,
        }
    }

    /// Record claims and outcomes in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Claimant recorded on bundles handled by this loop.
    #[must_use]
    pub const fn claimant(&self) -> &Claimant {
        &self.settings.claimant
    }

    /// Run claims until one finds no work, finds the tape system unavailable,
    /// or fails unexpectedly.
    ///
    /// # Errors
    ///
    /// Propagates a failure to claim; bundles already handled in this cycle keep
    /// their new status.
    pub async fn run_cycle(&self) -> LtaResult<CycleReport> {
        info!("Starting work on Bundles.");
        let mut claimed = 0;
        let mut completed = 0;
        let mut quarantined = 0;
        let mut failed = 0;
        let stop = loop {
            match self.claim_once().await? {
                ClaimOutcome::Unavailable => break StopReason::Unavailable,
                ClaimOutcome::NoWork => break StopReason::NoWork,
                ClaimOutcome::Completed(_) => {
                    claimed += 1;
                    completed += 1;
                }
                ClaimOutcome::Quarantined(_) => {
                    claimed += 1;
                    quarantined += 1;
                }
                ClaimOutcome::Failed(_) => {
                    claimed += 1;
                    failed += 1;
                    break StopReason::Failed;
                }
            }
        };
        info!(claimed, completed, quarantined, failed, stop = ?stop, "Ending work on Bundles.");
        if let Some(metrics) = &self.metrics {
            metrics.inc_work_cycle();
        }
        Ok(CycleReport {
            claimed,
            completed,
            quarantined,
            failed,
            stop,
        })
    }

    /// Claim at most one bundle and drive it to its next status.
    ///
    /// # Errors
    ///
    /// Returns an error only when the claim itself fails; nothing is held in
    /// that case, so there is nothing to quarantine.
    pub async fn claim_once(&self) -> LtaResult<ClaimOutcome> {
        if !self.stage.preflight().await {
            if let Some(metrics) = &self.metrics {
                metrics.inc_preflight_failure();
            }
            return Ok(ClaimOutcome::Unavailable);
        }

        let query = &self.settings.query;
        info!(
            source = %query.source,
            dest = %query.dest,
            status = %query.status,
            "Asking the LTA DB for a Bundle"
        );
        let Some(popped) = self
            .coordinator
            .pop_bundle(query, &self.settings.claimant)
            .await?
        else {
            info!("LTA DB did not provide a Bundle. Going on vacation.");
            return Ok(ClaimOutcome::NoWork);
        };
        if let Some(metrics) = &self.metrics {
            metrics.inc_claimed();
        }

        let span = info_span!("bundle", uuid = %popped.uuid());
        match popped {
            PoppedBundle::Valid(bundle) => self.handle(bundle).instrument(span).await,
            PoppedBundle::Malformed { uuid, error } => {
                self.reject_malformed(uuid, &error).instrument(span).await;
                Ok(ClaimOutcome::Failed(uuid))
            }
        }
    }

    async fn reject_malformed(&self, uuid: Uuid, err: &LtaError) {
        error!(error = %err, detail = %err.detail(), "claimed bundle could not be decoded");
        self.quarantine(uuid, &format!("Exception during execution: {}", err.detail()))
            .await;
        if let Some(metrics) = &self.metrics {
            metrics.inc_failed();
        }
    }

    async fn handle(&self, bundle: Bundle) -> LtaResult<ClaimOutcome> {
        info!(path = %bundle.path, bundle_path = %bundle.bundle_path, "claimed bundle");
        let uuid = bundle.uuid;
        let outcome = match self.process(&bundle).await {
            Ok(StageOutcome::Done) => {
                info!(status = %self.settings.output_status, "bundle advanced");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_completed();
                }
                ClaimOutcome::Completed(uuid)
            }
            Ok(StageOutcome::Rejected(rejection)) => {
                warn!(reason = %rejection, "bundle rejected");
                self.quarantine(uuid, &rejection.to_string()).await;
                if let Some(metrics) = &self.metrics {
                    metrics.inc_quarantined();
                }
                ClaimOutcome::Quarantined(uuid)
            }
            Err(err) => {
                error!(error = %err, detail = %err.detail(), "bundle processing failed");
                self.quarantine(uuid, &format!("Exception during execution: {}", err.detail()))
                    .await;
                if let Some(metrics) = &self.metrics {
                    metrics.inc_failed();
                }
                ClaimOutcome::Failed(uuid)
            }
        };
        Ok(outcome)
    }

    async fn process(&self, bundle: &Bundle) -> LtaResult<StageOutcome> {
        match self.stage.execute(bundle).await? {
            StageOutcome::Done => {
                self.stage.on_success(bundle).await?;
                let patch = BundlePatch::advance(self.settings.output_status, Utc::now());
                self.coordinator.patch_bundle(bundle.uuid, &patch).await?;
                Ok(StageOutcome::Done)
            }
            rejected @ StageOutcome::Rejected(_) => Ok(rejected),
        }
    }

    async fn quarantine(&self, uuid: Uuid, reason: &str) {
        let reason = format!("BY:{} REASON:{reason}", self.settings.claimant);
        let patch = BundlePatch::quarantine(reason, Utc::now());
        if let Err(err) = self.coordinator.patch_bundle(uuid, &patch).await {
            error!(
                error = %err,
                detail = %err.detail(),
                "unable to quarantine bundle"
            );
        }
    }
}
