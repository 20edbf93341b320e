//! Core LTA domain types shared across the workspace.

mod bundle;
mod catalog;
mod command;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use bundle::{
    Bundle, BundlePatch, BundleStatus, Checksum, Claimant, PopQuery, PoppedBundle, SHA512,
    lta_timestamp, now_timestamp,
};
pub use catalog::{
    CatalogEntry, FileRecord, Location, LtaArchiveInfo, MetadataRecord, UPDATE_CHUNK_SIZE,
};
pub use command::{CommandOutput, TapeCommand};

use crate::error::Rejection;

/// Result of running a stage's tape steps against a claimed bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Every step succeeded; the bundle may advance.
    Done,
    /// A step refused the bundle; it must be quarantined.
    Rejected(Rejection),
}

/// Heartbeat payload reported under the component's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Time of this heartbeat.
    pub timestamp: String,
    /// Start of the most recent work cycle.
    pub last_work_begin_timestamp: String,
    /// End of the most recent work cycle.
    pub last_work_end_timestamp: String,
    /// Component-specific counters.
    #[serde(default)]
    pub status: Value,
}
