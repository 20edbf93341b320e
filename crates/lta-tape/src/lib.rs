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

//! HPSS tape-system plumbing for the LTA workers.
//!
//! Layout: `hsi.rs` (exact argv for `hsi`/`hpss_avail`), `runner.rs`
//! (subprocess execution), `parse.rs` (column grammar for `hashlist` and
//! `hashverify` output), `paths.rs` (lexical tape path normalisation).

pub mod error;
pub mod hsi;
pub mod parse;
pub mod paths;
pub mod runner;

pub use error::OutputError;
pub use hsi::{DEFAULT_HPSS_AVAIL_PATH, DEFAULT_HSI_PATH, HsiToolkit};
pub use parse::{HashListEntry, HashVerifyEntry, parse_hashlist, parse_hashverify};
pub use paths::{basename, join_tape_path, normalize_path};
pub use runner::ProcessRunner;
