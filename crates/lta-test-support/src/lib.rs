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

//! Shared test helpers used across the worker suites.
//! Layout: fixtures.rs (sample bundles and tape output), mocks.rs (in-memory collaborators).

pub mod fixtures;
pub mod mocks;

pub use mocks::{MemoryCatalog, MemoryCoordinator, ScriptedRunner, StoredFile};
