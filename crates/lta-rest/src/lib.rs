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

//! HTTP clients for the services the tape workers depend on.
//!
//! Layout: `client.rs` (bearer-authenticated JSON transport with retries),
//! `lta.rs` (LTA DB coordinator), `catalog.rs` (File Catalog).

pub mod catalog;
pub mod client;
pub mod lta;

pub use catalog::FileCatalogClient;
pub use client::{RestClient, RestSettings};
pub use lta::LtaDbClient;
