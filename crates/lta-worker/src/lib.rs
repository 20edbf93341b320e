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

//! Tape workers built on one claim-execute-transition loop.
//!
//! Layout: `stage.rs` (the [`ArchiveStage`] seam), `claim.rs` (claim loop and
//! quarantine handling), `tape.rs` (checked command execution and tape path
//! layout), `writer.rs` and `verifier.rs` (the two stages).

pub mod claim;
pub mod stage;
pub mod tape;
pub mod verifier;
pub mod writer;

pub use claim::{ClaimLoop, ClaimOutcome, ClaimSettings, CycleReport, StopReason};
pub use stage::ArchiveStage;
pub use tape::{TapeLayout, TapeSession};
pub use verifier::ArchiveVerifier;
pub use writer::ArchiveWriter;
