//! Archive writer: copies a staged bundle archive onto HPSS.

use async_trait::async_trait;
use lta_core::{Bundle, LtaResult, StageOutcome};
use tracing::info;

use crate::stage::ArchiveStage;
use crate::tape::{TapeLayout, TapeSession, staging_path};

/// Writes bundle archives to tape with `hsi mkdir` and `hsi put`.
pub struct ArchiveWriter {
    tape: TapeSession,
    layout: TapeLayout,
    staging_base: String,
}

impl ArchiveWriter {
    /// Writer reading archives from `staging_base` and writing under `layout`.
    #[must_use]
    pub fn new(tape: TapeSession, layout: TapeLayout, staging_base: impl Into<String>) -> Self {
        Self {
            tape,
            layout,
            staging_base: staging_base.into(),
        }
    }
}

#[async_trait]
impl ArchiveStage for ArchiveWriter {
    async fn preflight(&self) -> bool {
        self.tape.probe().await
    }

    async fn execute(&self, bundle: &Bundle) -> LtaResult<StageOutcome> {
        let dest_dir = self.layout.dest_dir(bundle);
        let hpss_path = self.layout.hpss_path(bundle);
        let src = staging_path(&self.staging_base, bundle);

        let mkdir = self.tape.toolkit().mkdir(&dest_dir);
        if let Err(rejection) = self.tape.run_checked(&mkdir).await? {
            return Ok(StageOutcome::Rejected(rejection));
        }

        let put = self.tape.toolkit().put(&src, &hpss_path);
        if let Err(rejection) = self.tape.run_checked(&put).await? {
            return Ok(StageOutcome::Rejected(rejection));
        }

        info!(src = %src, hpss_path = %hpss_path, "bundle written to tape");
        Ok(StageOutcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lta_core::{BundleStatus, Claimant, Coordinator, PopQuery};
    use lta_tape::HsiToolkit;
    use lta_test_support::{MemoryCoordinator, ScriptedRunner, fixtures};

    use super::*;
    use crate::claim::{ClaimLoop, ClaimOutcome, ClaimSettings};

    fn writer(runner: &Arc<ScriptedRunner>) -> ArchiveWriter {
        ArchiveWriter::new(
            TapeSession::new(runner.clone(), HsiToolkit::new("/usr/bin/hsi", "hpss_avail")),
            TapeLayout::new(fixtures::TAPE_BASE),
            fixtures::STAGING_BASE,
        )
    }

    fn claim_loop(
        runner: &Arc<ScriptedRunner>,
        coordinator: &Arc<MemoryCoordinator>,
        claimant: &Claimant,
    ) -> ClaimLoop<ArchiveWriter> {
        let coordinator: Arc<dyn Coordinator> = coordinator.clone();
        ClaimLoop::new(
            writer(runner),
            coordinator,
            ClaimSettings {
                claimant: claimant.clone(),
                query: PopQuery {
                    source: "WIPAC".into(),
                    dest: "NERSC".into(),
                    status: BundleStatus::Taping,
                },
                output_status: BundleStatus::Verifying,
            },
        )
    }

    #[tokio::test]
    async fn writes_with_exact_hsi_arguments() -> anyhow::Result<()> {
        let runner = Arc::new(ScriptedRunner::new());
        let bundle = fixtures::bundle(BundleStatus::Taping);
        let outcome = writer(&runner).execute(&bundle).await?;
        assert_eq!(outcome, StageOutcome::Done);

        let hpss_path = fixtures::hpss_path(&bundle);
        let src = format!("{}/{}.zip", fixtures::STAGING_BASE, bundle.uuid);
        assert_eq!(
            runner.argvs(),
            vec![
                vec![
                    "/usr/bin/hsi".to_string(),
                    "mkdir".into(),
                    "-p".into(),
                    format!("{}{}", fixtures::TAPE_BASE, bundle.path),
                ],
                vec![
                    "/usr/bin/hsi".to_string(),
                    "put".into(),
                    "-c".into(),
                    "on".into(),
                    "-H".into(),
                    "sha512".into(),
                    src,
                    ":".into(),
                    hpss_path,
                ],
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn mkdir_failure_stops_before_put() -> anyhow::Result<()> {
        let runner = Arc::new(ScriptedRunner::new().on("hsi mkdir", 1, ""));
        let bundle = fixtures::bundle(BundleStatus::Taping);
        let outcome = writer(&runner).execute(&bundle).await?;
        assert!(matches!(
            outcome,
            StageOutcome::Rejected(ref rejection) if rejection.to_string() == "hsi mkdir Command Failed (returncode: 1)"
        ));
        assert_eq!(runner.labels(), vec!["hsi mkdir"]);
        Ok(())
    }

    #[tokio::test]
    async fn put_failure_quarantines_bundle() -> anyhow::Result<()> {
        let runner = Arc::new(ScriptedRunner::new().on("hsi put", 64, ""));
        let coordinator = Arc::new(MemoryCoordinator::new());
        let bundle = fixtures::bundle(BundleStatus::Taping);
        coordinator.push_bundle(bundle.clone());
        let claimant = Claimant::generate("testing-mover");

        let outcome = claim_loop(&runner, &coordinator, &claimant)
            .claim_once()
            .await?;
        assert_eq!(outcome, ClaimOutcome::Quarantined(bundle.uuid));
        let patches = coordinator.patches_for(bundle.uuid);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].status, Some(BundleStatus::Quarantined));
        assert_eq!(
            patches[0].reason.as_deref(),
            Some(format!("BY:{claimant} REASON:hsi put Command Failed (returncode: 64)").as_str())
        );
        Ok(())
    }

    #[tokio::test]
    async fn successful_write_advances_to_verifying() -> anyhow::Result<()> {
        let runner = Arc::new(ScriptedRunner::new());
        let coordinator = Arc::new(MemoryCoordinator::new());
        let bundle = fixtures::bundle(BundleStatus::Taping);
        coordinator.push_bundle(bundle.clone());
        let claimant = Claimant::generate("testing-mover");

        let report = claim_loop(&runner, &coordinator, &claimant)
            .run_cycle()
            .await?;
        assert_eq!(report.completed, 1);
        assert_eq!(
            runner.labels(),
            vec!["hpss_avail", "hsi mkdir", "hsi put", "hpss_avail"]
        );
        let patches = coordinator.patches_for(bundle.uuid);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].status, Some(BundleStatus::Verifying));
        assert_eq!(patches[0].claimed, Some(false));
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_hpss_leaves_bundle_unclaimed() -> anyhow::Result<()> {
        let runner = Arc::new(ScriptedRunner::new().on("hpss_avail", 1, ""));
        let coordinator = Arc::new(MemoryCoordinator::new());
        coordinator.push_bundle(fixtures::bundle(BundleStatus::Taping));
        let claimant = Claimant::generate("testing-mover");

        let outcome = claim_loop(&runner, &coordinator, &claimant)
            .claim_once()
            .await?;
        assert_eq!(outcome, ClaimOutcome::Unavailable);
        assert!(coordinator.pops().is_empty());
        assert_eq!(runner.labels(), vec!["hpss_avail"]);
        Ok(())
    }

    #[tokio::test]
    async fn spawn_failure_is_an_exception_quarantine() -> anyhow::Result<()> {
        let runner = Arc::new(ScriptedRunner::new().spawn_failure("hsi put"));
        let coordinator = Arc::new(MemoryCoordinator::new());
        let bundle = fixtures::bundle(BundleStatus::Taping);
        coordinator.push_bundle(bundle.clone());
        let claimant = Claimant::generate("testing-mover");

        let outcome = claim_loop(&runner, &coordinator, &claimant)
            .claim_once()
            .await?;
        assert_eq!(outcome, ClaimOutcome::Failed(bundle.uuid));
        let reason = coordinator.patches_for(bundle.uuid)[0]
            .reason
            .clone()
            .unwrap_or_default();
        assert!(reason.contains("REASON:Exception during execution: unable to run /usr/bin/hsi"));
        Ok(())
    }
}
