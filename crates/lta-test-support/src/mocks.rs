//! In-memory collaborators for exercising the claim loop without services or tape.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use lta_core::{
    Bundle, BundlePatch, BundleStatus, Catalog, CatalogEntry, Claimant, CommandOutput,
    CommandRunner, ComponentStatus, Coordinator, FileRecord, Location, LtaError, LtaResult,
    MetadataRecord, PopQuery, PoppedBundle, TapeCommand,
};
use serde_json::Value;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn http_error(operation: &'static str, url: String, status: u16, body: &str) -> LtaError {
    LtaError::HttpStatus {
        service: "memory",
        operation,
        url,
        status,
        body: body.to_string(),
    }
}

enum Queued {
    Bundle(Bundle),
    Raw(Value),
}

#[derive(Default)]
struct CoordinatorState {
    queue: VecDeque<Queued>,
    pops: Vec<(PopQuery, String)>,
    patches: Vec<(Uuid, BundlePatch)>,
    metadata: Vec<MetadataRecord>,
    delete_requests: Vec<Vec<Uuid>>,
    heartbeats: Vec<(String, String, ComponentStatus)>,
    delete_shortfall: usize,
    fail_pops: bool,
    fail_patches_to: Option<BundleStatus>,
    fail_all_patches: bool,
}

/// Coordinator holding bundles and metadata in memory.
///
/// Pops hand out queued bundles in order; every patch and heartbeat is recorded.
#[derive(Default)]
pub struct MemoryCoordinator {
    state: Mutex<CoordinatorState>,
}

impl MemoryCoordinator {
    /// Empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a bundle for the next pop.
    pub fn push_bundle(&self, bundle: Bundle) {
        lock(&self.state).queue.push_back(Queued::Bundle(bundle));
    }

    /// Queue a raw `bundle` object, decoded on pop the way a coordinator reply is.
    pub fn push_raw(&self, bundle: Value) {
        lock(&self.state).queue.push_back(Queued::Raw(bundle));
    }

    /// Store metadata records.
    pub fn add_metadata(&self, records: impl IntoIterator<Item = MetadataRecord>) {
        lock(&self.state).metadata.extend(records);
    }

    /// Report `shortfall` fewer deletions than requested on every bulk delete.
    pub fn set_delete_shortfall(&self, shortfall: usize) {
        lock(&self.state).delete_shortfall = shortfall;
    }

    /// Make pops fail with a transport error.
    pub fn fail_pops(&self) {
        lock(&self.state).fail_pops = true;
    }

    /// Make patches that set `status` fail with a server error.
    pub fn fail_patches_to(&self, status: BundleStatus) {
        lock(&self.state).fail_patches_to = Some(status);
    }

    /// Make every patch fail with a server error.
    pub fn fail_all_patches(&self) {
        lock(&self.state).fail_all_patches = true;
    }

    /// Pop requests seen so far, with the rendered claimant.
    #[must_use]
    pub fn pops(&self) -> Vec<(PopQuery, String)> {
        lock(&self.state).pops.clone()
    }

    /// Patches applied so far, in order.
    #[must_use]
    pub fn patches(&self) -> Vec<(Uuid, BundlePatch)> {
        lock(&self.state).patches.clone()
    }

    /// Patches applied to `uuid`, in order.
    #[must_use]
    pub fn patches_for(&self, uuid: Uuid) -> Vec<BundlePatch> {
        lock(&self.state)
            .patches
            .iter()
            .filter(|(target, _)| *target == uuid)
            .map(|(_, patch)| patch.clone())
            .collect()
    }

    /// Metadata records still stored.
    #[must_use]
    pub fn remaining_metadata(&self) -> Vec<MetadataRecord> {
        lock(&self.state).metadata.clone()
    }

    /// Identifier lists passed to bulk delete, in order.
    #[must_use]
    pub fn delete_requests(&self) -> Vec<Vec<Uuid>> {
        lock(&self.state).delete_requests.clone()
    }

    /// Heartbeats received as `(component_type, name, status)`.
    #[must_use]
    pub fn heartbeats(&self) -> Vec<(String, String, ComponentStatus)> {
        lock(&self.state).heartbeats.clone()
    }

    /// Bundles still queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        lock(&self.state).queue.len()
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn pop_bundle(
        &self,
        query: &PopQuery,
        claimant: &Claimant,
    ) -> LtaResult<Option<PoppedBundle>> {
        let mut state = lock(&self.state);
        if state.fail_pops {
            return Err(LtaError::Transport {
                service: "memory",
                operation: "bundle.pop",
                url: "memory:///Bundles/actions/pop".to_string(),
                source: Box::new(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
            });
        }
        state.pops.push((query.clone(), claimant.to_string()));
        match state.queue.pop_front() {
            None => Ok(None),
            Some(Queued::Bundle(mut bundle)) => {
                bundle.claimed = true;
                bundle.claimant = Some(claimant.to_string());
                Ok(Some(PoppedBundle::Valid(bundle)))
            }
            Some(Queued::Raw(value)) => PoppedBundle::decode("memory", value).map(Some),
        }
    }

    async fn patch_bundle(&self, uuid: Uuid, patch: &BundlePatch) -> LtaResult<()> {
        let mut state = lock(&self.state);
        let refused = state.fail_all_patches
            || (state.fail_patches_to.is_some() && state.fail_patches_to == patch.status);
        if refused {
            return Err(http_error(
                "bundle.patch",
                format!("memory:///Bundles/{uuid}"),
                500,
                "database unavailable",
            ));
        }
        state.patches.push((uuid, patch.clone()));
        Ok(())
    }

    async fn list_metadata(
        &self,
        bundle_uuid: Uuid,
        limit: usize,
    ) -> LtaResult<Vec<MetadataRecord>> {
        Ok(lock(&self.state)
            .metadata
            .iter()
            .filter(|record| record.bundle_uuid == bundle_uuid)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn bulk_delete_metadata(&self, uuids: &[Uuid]) -> LtaResult<usize> {
        let mut state = lock(&self.state);
        state.delete_requests.push(uuids.to_vec());
        let before = state.metadata.len();
        state.metadata.retain(|record| !uuids.contains(&record.uuid));
        let deleted = before - state.metadata.len();
        Ok(deleted.saturating_sub(state.delete_shortfall))
    }

    async fn patch_status(
        &self,
        component_type: &str,
        name: &str,
        status: &ComponentStatus,
    ) -> LtaResult<()> {
        lock(&self.state).heartbeats.push((
            component_type.to_string(),
            name.to_string(),
            status.clone(),
        ));
        Ok(())
    }
}

/// A file as the in-memory catalog stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Canonical name.
    pub logical_name: String,
    /// Known copies, without duplicates.
    pub locations: Vec<Location>,
    /// Last full record written by create or update.
    pub record: Option<FileRecord>,
}

#[derive(Default)]
struct CatalogState {
    files: BTreeMap<Uuid, StoredFile>,
    calls: Vec<String>,
    fail_creates: bool,
}

/// File catalog held in memory.
///
/// Creates conflict on existing identifiers, reads of unknown files return 404,
/// and location lists are de-duplicated like the real service.
#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file that already exists in the catalog.
    pub fn insert_file(&self, uuid: Uuid, logical_name: impl Into<String>) {
        lock(&self.state).files.insert(
            uuid,
            StoredFile {
                logical_name: logical_name.into(),
                locations: Vec::new(),
                record: None,
            },
        );
    }

    /// Make every create fail with a server error.
    pub fn fail_creates(&self) {
        lock(&self.state).fail_creates = true;
    }

    /// Stored state of `uuid`.
    #[must_use]
    pub fn file(&self, uuid: Uuid) -> Option<StoredFile> {
        lock(&self.state).files.get(&uuid).cloned()
    }

    /// Calls received, rendered as `"<operation> <uuid>"`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }
}

fn merge_locations(existing: &mut Vec<Location>, added: &[Location]) {
    for location in added {
        if !existing.contains(location) {
            existing.push(location.clone());
        }
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn create_file(&self, record: &FileRecord) -> LtaResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(format!("create {}", record.uuid));
        if state.fail_creates {
            return Err(http_error(
                "file.create",
                "memory:///api/files".to_string(),
                500,
                "catalog unavailable",
            ));
        }
        if state.files.contains_key(&record.uuid) {
            return Err(http_error(
                "file.create",
                "memory:///api/files".to_string(),
                409,
                "conflict with existing file (uuid already exists)",
            ));
        }
        let mut locations = Vec::new();
        merge_locations(&mut locations, &record.locations);
        state.files.insert(
            record.uuid,
            StoredFile {
                logical_name: record.logical_name.clone(),
                locations,
                record: Some(record.clone()),
            },
        );
        Ok(())
    }

    async fn update_file(&self, uuid: Uuid, record: &FileRecord) -> LtaResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(format!("update {uuid}"));
        let Some(file) = state.files.get_mut(&uuid) else {
            return Err(http_error(
                "file.update",
                format!("memory:///api/files/{uuid}"),
                404,
                "not found",
            ));
        };
        file.logical_name.clone_from(&record.logical_name);
        merge_locations(&mut file.locations, &record.locations);
        file.record = Some(record.clone());
        Ok(())
    }

    async fn get_file(&self, uuid: Uuid) -> LtaResult<CatalogEntry> {
        let mut state = lock(&self.state);
        state.calls.push(format!("get {uuid}"));
        state
            .files
            .get(&uuid)
            .map(|file| CatalogEntry {
                logical_name: file.logical_name.clone(),
                locations: file.locations.clone(),
            })
            .ok_or_else(|| {
                http_error(
                    "file.get",
                    format!("memory:///api/files/{uuid}"),
                    404,
                    "not found",
                )
            })
    }

    async fn add_locations(&self, uuid: Uuid, locations: &[Location]) -> LtaResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(format!("locations {uuid}"));
        let Some(file) = state.files.get_mut(&uuid) else {
            return Err(http_error(
                "file.add_locations",
                format!("memory:///api/files/{uuid}/locations"),
                404,
                "not found",
            ));
        };
        merge_locations(&mut file.locations, locations);
        Ok(())
    }
}

enum Scripted {
    Output(CommandOutput),
    SpawnFailure,
}

/// Command runner returning scripted results per command label.
///
/// Commands without a script exit 0 with empty output. Scripts queued for a
/// label are consumed in order; the last one keeps answering once the queue
/// would otherwise run dry.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<&'static str, VecDeque<Scripted>>>,
    invocations: Mutex<Vec<(&'static str, Vec<String>)>>,
}

impl ScriptedRunner {
    /// Runner where every command succeeds silently.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `label` with `returncode` and `stdout`.
    #[must_use]
    pub fn on(self, label: &'static str, returncode: i32, stdout: impl Into<String>) -> Self {
        self.push(
            label,
            Scripted::Output(CommandOutput::exited(returncode, stdout, "")),
        );
        self
    }

    /// Answer `label` with a full output, including stderr.
    #[must_use]
    pub fn on_output(self, label: &'static str, output: CommandOutput) -> Self {
        self.push(label, Scripted::Output(output));
        self
    }

    /// Make `label` fail to spawn.
    #[must_use]
    pub fn spawn_failure(self, label: &'static str) -> Self {
        self.push(label, Scripted::SpawnFailure);
        self
    }

    fn push(&self, label: &'static str, scripted: Scripted) {
        lock(&self.scripts)
            .entry(label)
            .or_default()
            .push_back(scripted);
    }

    /// Labels of the commands run so far, in order.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        lock(&self.invocations)
            .iter()
            .map(|(label, _)| *label)
            .collect()
    }

    /// Argument vectors of the commands run so far, in order.
    #[must_use]
    pub fn argvs(&self) -> Vec<Vec<String>> {
        lock(&self.invocations)
            .iter()
            .map(|(_, argv)| argv.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &TapeCommand) -> LtaResult<CommandOutput> {
        lock(&self.invocations).push((command.label, command.argv()));
        let mut scripts = lock(&self.scripts);
        let queue = scripts.get_mut(command.label);
        let scripted = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().map(|scripted| match scripted {
                Scripted::Output(output) => Scripted::Output(output.clone()),
                Scripted::SpawnFailure => Scripted::SpawnFailure,
            }),
            None => None,
        };
        drop(scripts);
        match scripted {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::SpawnFailure) => Err(LtaError::CommandSpawn {
                program: command.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            }),
            None => Ok(CommandOutput::exited(0, "", "")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lta_core::Checksum;

    #[tokio::test]
    async fn coordinator_counts_short_deletes() -> anyhow::Result<()> {
        let coordinator = MemoryCoordinator::new();
        let bundle_uuid = Uuid::new_v4();
        let records = crate::fixtures::metadata(bundle_uuid, 3);
        coordinator.add_metadata(records.clone());
        coordinator.set_delete_shortfall(1);

        let page = coordinator.list_metadata(bundle_uuid, 2).await?;
        assert_eq!(page.len(), 2);
        let uuids: Vec<Uuid> = page.iter().map(|record| record.uuid).collect();
        assert_eq!(coordinator.bulk_delete_metadata(&uuids).await?, 1);
        assert_eq!(coordinator.remaining_metadata(), vec![records[2].clone()]);
        Ok(())
    }

    #[tokio::test]
    async fn catalog_conflicts_and_dedupes() -> anyhow::Result<()> {
        let catalog = MemoryCatalog::new();
        let uuid = Uuid::new_v4();
        let record = FileRecord {
            uuid,
            logical_name: "/tape/X.zip".into(),
            checksum: Checksum::sha512("abc"),
            locations: vec![Location::hpss("NERSC", "/tape/X.zip")],
            file_size: 1,
            lta: lta_core::LtaArchiveInfo {
                date_archived: "2019-01-01T00:00:00.000000".into(),
            },
        };
        catalog.create_file(&record).await?;
        assert!(matches!(
            catalog.create_file(&record).await,
            Err(LtaError::HttpStatus { status: 409, .. })
        ));
        catalog
            .add_locations(uuid, &[Location::hpss("NERSC", "/tape/X.zip")])
            .await?;
        let stored = catalog
            .file(uuid)
            .ok_or_else(|| anyhow::anyhow!("file missing"))?;
        assert_eq!(stored.locations.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn runner_replays_last_script() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new()
            .on("hsi put", 1, "")
            .on("hsi put", 0, "done");
        let put = TapeCommand::new("hsi put", "hsi", ["put"]);
        assert_eq!(runner.run(&put).await?.returncode, Some(1));
        assert_eq!(runner.run(&put).await?.stdout, "done");
        assert_eq!(runner.run(&put).await?.stdout, "done");
        let other = TapeCommand::new("hsi mkdir", "hsi", ["mkdir"]);
        assert!(runner.run(&other).await?.success());
        assert_eq!(runner.labels(), vec!["hsi put", "hsi put", "hsi put", "hsi mkdir"]);
        Ok(())
    }
}
