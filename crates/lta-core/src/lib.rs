#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

//! Domain model and collaborator interfaces shared by the LTA tape workers.
//!
//! Layout: `model/` (bundles, patches, catalog records, tape commands),
//! `service/` (coordinator, catalog and command-runner traits), `error.rs`
//! (error taxonomy and quarantine rejections).

pub mod error;
pub mod model;
pub mod service;

pub use error::{LtaError, LtaResult, Rejection};
pub use model::{
    Bundle, BundlePatch, BundleStatus, CatalogEntry, Checksum, Claimant, CommandOutput,
    ComponentStatus, FileRecord, Location, LtaArchiveInfo, MetadataRecord, PopQuery,
    PoppedBundle, SHA512, StageOutcome, TapeCommand, UPDATE_CHUNK_SIZE, lta_timestamp,
    now_timestamp,
};
pub use service::{Catalog, CommandRunner, Coordinator};
