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

//! Environment-driven configuration for the tape workers.
//!
//! Layout: `model.rs` (typed worker configuration), `defaults.rs` (documented
//! fallbacks), `validate.rs` (value parsers), `loader.rs` (key lookup and
//! assembly), `error.rs` (error taxonomy).

mod defaults;
pub mod error;
mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{Component, RetryPolicy, ServiceEndpoint, StageConfig, WorkerConfig};
