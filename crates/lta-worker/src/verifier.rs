//! Archive verifier: checks the tape copy and records it in the File Catalog.
//!
//! A bundle passes when `hsi hashlist` reports the digest recorded at bundle
//! creation and `hsi hashverify` confirms HPSS can read it back. The catalog is
//! then told about the archive and about every file packed into it, and the
//! coordinator's metadata for those files is released page by page.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lta_core::{
    Bundle, Catalog, Coordinator, FileRecord, Location, LtaArchiveInfo, LtaError, LtaResult,
    Rejection, SHA512, StageOutcome, UPDATE_CHUNK_SIZE, lta_timestamp,
};
use lta_tape::{parse_hashlist, parse_hashverify};
use lta_telemetry::Metrics;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::stage::ArchiveStage;
use crate::tape::{TapeLayout, TapeSession};

/// Verifies tape copies with `hsi hashlist`/`hsi hashverify` and reconciles the catalog.
pub struct ArchiveVerifier {
    tape: TapeSession,
    layout: TapeLayout,
    coordinator: Arc<dyn Coordinator>,
    catalog: Arc<dyn Catalog>,
    dest_site: String,
    metrics: Option<Metrics>,
}

impl ArchiveVerifier {
    /// Verifier recording locations under `dest_site`.
    #[must_use]
    pub fn new(
        tape: TapeSession,
        layout: TapeLayout,
        coordinator: Arc<dyn Coordinator>,
        catalog: Arc<dyn Catalog>,
        dest_site: impl Into<String>,
    ) -> Self {
        Self {
            tape,
            layout,
            coordinator,
            catalog,
            dest_site: dest_site.into(),
            metrics: None,
        }
    }

    /// Count reconciled metadata in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn verify(&self, bundle: &Bundle, hpss_path: &str) -> LtaResult<StageOutcome> {
        let hashlist = self.tape.toolkit().hashlist(hpss_path);
        let output = match self.tape.run_checked(&hashlist).await? {
            Ok(output) => output,
            Err(rejection) => return Ok(StageOutcome::Rejected(rejection)),
        };
        let entry = match parse_hashlist(&output.stdout) {
            Ok(entry) => entry,
            Err(problem) => {
                return Ok(StageOutcome::Rejected(Rejection::MalformedOutput {
                    command: hashlist.label,
                    problem: problem.describe(),
                    output: output.stdout.clone(),
                }));
            }
        };
        let expected = bundle
            .checksum
            .digest(SHA512)
            .ok_or(LtaError::MissingChecksum { algorithm: SHA512 })?;
        if entry.digest != expected {
            warn!(
                expected,
                actual = entry.digest,
                "SHA512 checksum at the time of bundle creation does not match SHA512 checksum in HPSS"
            );
            return Ok(StageOutcome::Rejected(Rejection::ChecksumMismatch {
                expected: expected.to_string(),
                actual: entry.digest.to_string(),
            }));
        }
        info!(digest = expected, "SHA512 checksum in HPSS matches bundle creation");

        let hashverify = self.tape.toolkit().hashverify(hpss_path);
        let output = match self.tape.run_checked(&hashverify).await? {
            Ok(output) => output,
            Err(rejection) => return Ok(StageOutcome::Rejected(rejection)),
        };
        let verified = match parse_hashverify(&output.stdout) {
            Ok(entry) => entry.is_sha512_ok(),
            Err(problem) => {
                return Ok(StageOutcome::Rejected(Rejection::MalformedOutput {
                    command: hashverify.label,
                    problem: problem.describe(),
                    output: output.stdout.clone(),
                }));
            }
        };
        if !verified {
            warn!(
                expected = %format!("{hpss_path}: (sha512) OK"),
                stdout = %output.stdout,
                stderr = %output.stderr,
                "hashverify result does not match; bundle will not be verified"
            );
            return Ok(StageOutcome::Rejected(Rejection::VerifyFailed {
                output: output.stdout,
            }));
        }
        info!(hpss_path, "HPSS verified the archive checksum");
        Ok(StageOutcome::Done)
    }

    /// Create the catalog record for the archive, updating it if it already exists.
    async fn register_bundle(&self, bundle: &Bundle, hpss_path: &str) -> LtaResult<()> {
        let record = FileRecord {
            uuid: bundle.uuid,
            logical_name: hpss_path.to_string(),
            checksum: bundle.checksum.clone(),
            locations: vec![Location::hpss(self.dest_site.clone(), hpss_path)],
            file_size: bundle.size,
            lta: LtaArchiveInfo {
                date_archived: lta_timestamp(Utc::now()),
            },
        };
        info!(hpss_path, "POST /api/files");
        if let Err(err) = self.catalog.create_file(&record).await {
            error!(error = %err, detail = %err.detail(), "POST /api/files failed; updating instead");
            info!(uuid = %bundle.uuid, "PATCH /api/files");
            self.catalog.update_file(bundle.uuid, &record).await?;
        }
        Ok(())
    }

    /// Record the archive location of every file packed into the bundle and
    /// release the coordinator's metadata for them.
    async fn reconcile_metadata(&self, bundle_uuid: Uuid, hpss_path: &str) -> LtaResult<usize> {
        let mut reconciled = 0;
        loop {
            let page = self
                .coordinator
                .list_metadata(bundle_uuid, UPDATE_CHUNK_SIZE)
                .await?;
            info!(count = page.len(), "LTA DB returned Metadata documents to process");
            if page.is_empty() {
                break;
            }

            for record in &page {
                let entry = self.catalog.get_file(record.file_catalog_uuid).await?;
                let location =
                    Location::in_archive(self.dest_site.clone(), hpss_path, &entry.logical_name);
                self.catalog
                    .add_locations(record.file_catalog_uuid, &[location])
                    .await?;
            }

            let uuids: Vec<Uuid> = page.iter().map(|record| record.uuid).collect();
            let deleted = self.coordinator.bulk_delete_metadata(&uuids).await?;
            info!(deleted, "LTA DB reports Metadata records are deleted");
            if deleted != uuids.len() {
                return Err(LtaError::DeleteCountMismatch {
                    requested: uuids.len(),
                    deleted,
                });
            }
            reconciled += deleted;
            if let Some(metrics) = &self.metrics {
                metrics.add_metadata_reconciled(u64::try_from(deleted).unwrap_or(u64::MAX));
            }
        }
        Ok(reconciled)
    }
}

#[async_trait]
impl ArchiveStage for ArchiveVerifier {
    async fn preflight(&self) -> bool {
        self.tape.probe().await
    }

    async fn execute(&self, bundle: &Bundle) -> LtaResult<StageOutcome> {
        let hpss_path = self.layout.hpss_path(bundle);
        self.verify(bundle, &hpss_path).await
    }

    async fn on_success(&self, bundle: &Bundle) -> LtaResult<()> {
        let hpss_path = self.layout.hpss_path(bundle);
        self.register_bundle(bundle, &hpss_path).await?;
        let reconciled = self.reconcile_metadata(bundle.uuid, &hpss_path).await?;
        info!(reconciled, "catalog updated for bundle contents");
        Ok(())
    }
}
