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

//! Process wiring for the LTA tape workers.
//!
//! Layout: `bootstrap.rs` (configuration, logging and client wiring),
//! `runtime.rs` (work loop, heartbeat and shutdown), `error.rs`.

/// Configuration loading and collaborator wiring.
pub mod bootstrap;
/// Application error taxonomy.
pub mod error;
/// Work loop and heartbeat task.
pub mod runtime;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
