//! Metadata and File Catalog records touched by the verifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bundle::Checksum;

/// Maximum number of metadata records handled per page.
pub const UPDATE_CHUNK_SIZE: usize = 1000;

/// One constituent file of a bundle, held by the coordinator until the catalog knows
/// about the archive copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Coordinator identifier of the metadata record.
    pub uuid: Uuid,
    /// Bundle the file was packed into.
    pub bundle_uuid: Uuid,
    /// Catalog identifier of the file.
    pub file_catalog_uuid: Uuid,
}

/// Physical location of a file as recorded in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Site label.
    pub site: String,
    /// Site-local path.
    pub path: String,
    /// Stored on the HPSS tape system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hpss: Option<bool>,
    /// Readable without recall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,
    /// Stored inside an archive bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<bool>,
}

impl Location {
    /// Tape copy of a bundle archive.
    #[must_use]
    pub fn hpss(site: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            path: path.into(),
            hpss: Some(true),
            online: Some(false),
            archive: None,
        }
    }

    /// A file packed inside a bundle archive, addressed as `<archive>:<logical_name>`.
    #[must_use]
    pub fn in_archive(site: impl Into<String>, archive_path: &str, logical_name: &str) -> Self {
        Self {
            site: site.into(),
            path: format!("{archive_path}:{logical_name}"),
            hpss: None,
            online: None,
            archive: Some(true),
        }
    }
}

/// LTA bookkeeping stored alongside the bundle's catalog record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtaArchiveInfo {
    /// When the archive was verified on tape.
    pub date_archived: String,
}

/// Catalog record for the bundle archive itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Catalog identifier; the bundle identifier is reused.
    pub uuid: Uuid,
    /// Canonical name; the archive's tape path.
    pub logical_name: String,
    /// Digests recorded at bundle creation.
    pub checksum: Checksum,
    /// Known copies.
    pub locations: Vec<Location>,
    /// Archive size in bytes.
    pub file_size: u64,
    /// LTA bookkeeping.
    pub lta: LtaArchiveInfo,
}

/// Subset of a catalog file entry read back by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Canonical name of the file.
    pub logical_name: String,
    /// Known copies, when the catalog returns them.
    #[serde(default)]
    pub locations: Vec<Location>,
}
