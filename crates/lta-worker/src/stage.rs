//! The seam between the claim loop and the work done on a claimed bundle.

use async_trait::async_trait;
use lta_core::{Bundle, LtaResult, StageOutcome};

/// One worker's share of the pipeline.
///
/// The claim loop owns claiming and every status transition; a stage only
/// reports whether the tape system accepted the bundle.
#[async_trait]
pub trait ArchiveStage: Send + Sync {
    /// Whether the tape system can take work right now. Nothing is claimed when it cannot.
    async fn preflight(&self) -> bool;

    /// Run the tape steps for `bundle`.
    async fn execute(&self, bundle: &Bundle) -> LtaResult<StageOutcome>;

    /// Side effects to apply after [`ArchiveStage::execute`] succeeded and
    /// before the bundle advances.
    async fn on_success(&self, _bundle: &Bundle) -> LtaResult<()> {
        Ok(())
    }
}
