//! Collaborator traits the claim loop is written against.
//!
//! The coordinator, the catalog and the tape binaries are external services;
//! production implementations live in `lta-rest` and `lta-tape`, in-memory ones
//! in `lta-test-support`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::LtaResult;
use crate::model::{
    BundlePatch, CatalogEntry, Claimant, CommandOutput, ComponentStatus, FileRecord, Location,
    MetadataRecord, PopQuery, PoppedBundle, TapeCommand,
};

/// Work-queue service holding authoritative bundle and metadata state.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Atomically claim one bundle matching `query` for `claimant`.
    ///
    /// Returns `None` when no bundle is available. At most one claimant holds a
    /// given bundle at a time; the worker relies on this and adds no locking.
    /// A bundle whose body does not decode is still returned, as
    /// [`PoppedBundle::Malformed`], because it is already claimed.
    async fn pop_bundle(
        &self,
        query: &PopQuery,
        claimant: &Claimant,
    ) -> LtaResult<Option<PoppedBundle>>;

    /// Apply a partial update to a bundle.
    async fn patch_bundle(&self, uuid: Uuid, patch: &BundlePatch) -> LtaResult<()>;

    /// Fetch up to `limit` metadata records packed into `bundle_uuid`.
    async fn list_metadata(&self, bundle_uuid: Uuid, limit: usize)
    -> LtaResult<Vec<MetadataRecord>>;

    /// Delete metadata records, returning the number the coordinator reports as deleted.
    async fn bulk_delete_metadata(&self, uuids: &[Uuid]) -> LtaResult<usize>;

    /// Report component liveness under `component_type`/`name`.
    async fn patch_status(
        &self,
        component_type: &str,
        name: &str,
        status: &ComponentStatus,
    ) -> LtaResult<()>;
}

/// Metadata service recording file identity and physical locations.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Create a file record; fails when the identifier already exists.
    async fn create_file(&self, record: &FileRecord) -> LtaResult<()>;

    /// Update an existing file record.
    async fn update_file(&self, uuid: Uuid, record: &FileRecord) -> LtaResult<()>;

    /// Read a file record.
    async fn get_file(&self, uuid: Uuid) -> LtaResult<CatalogEntry>;

    /// Append locations to a file; the catalog drops duplicates.
    async fn add_locations(&self, uuid: Uuid, locations: &[Location]) -> LtaResult<()>;
}

/// Executes tape-system binaries.
///
/// Calls block until the process exits; there is no timeout and no
/// cancellation once a command has been issued.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion and capture its output.
    async fn run(&self, command: &TapeCommand) -> LtaResult<CommandOutput>;
}
