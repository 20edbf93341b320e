//! # Design
//!
//! - `LtaError` carries constant messages with context fields, like every
//!   other error type in the workspace; `detail()` renders the operator-facing
//!   diagnostic embedded in quarantine reasons.
//! - `Rejection` is not an error: it is the domain outcome of a tape step that
//!   ran but did not succeed, and it always ends in quarantine.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

use thiserror::Error;

/// Result alias for LTA worker operations.
pub type LtaResult<T> = Result<T, LtaError>;

/// Failures raised while talking to collaborators or reconciling state.
#[derive(Debug, Error)]
pub enum LtaError {
    /// The request never produced an HTTP response.
    #[error("remote service transport failure")]
    Transport {
        /// Service that was contacted (`lta` or `file_catalog`).
        service: &'static str,
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// Underlying client error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The remote service answered with a non-success status.
    #[error("remote service returned an error status")]
    HttpStatus {
        /// Service that was contacted.
        service: &'static str,
        /// Operation identifier.
        operation: &'static str,
        /// URL used for the request.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The response body could not be decoded.
    #[error("remote service response could not be decoded")]
    Decode {
        /// Service that was contacted.
        service: &'static str,
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decode error.
        source: serde_json::Error,
    },
    /// A tape-system binary could not be started.
    #[error("tape command could not be spawned")]
    CommandSpawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The bundle carries no digest for the requested algorithm.
    #[error("bundle checksum missing")]
    MissingChecksum {
        /// Algorithm that was looked up.
        algorithm: &'static str,
    },
    /// The coordinator deleted a different number of metadata records than requested.
    #[error("metadata bulk delete count mismatch")]
    DeleteCountMismatch {
        /// Records handed to the coordinator for deletion.
        requested: usize,
        /// Records the coordinator reports as deleted.
        deleted: usize,
    },
}

impl LtaError {
    /// Human-readable diagnostic, suitable for a bundle `reason`.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transport {
                service,
                operation,
                url,
                source,
            } => format!("{service} {operation} request to {url} failed: {source}"),
            Self::HttpStatus {
                service,
                operation,
                url,
                status,
                body,
            } => {
                if body.is_empty() {
                    format!("{service} {operation} request to {url} returned status {status}")
                } else {
                    format!(
                        "{service} {operation} request to {url} returned status {status}: {body}"
                    )
                }
            }
            Self::Decode {
                service,
                operation,
                source,
            } => format!("{service} {operation} response could not be decoded: {source}"),
            Self::CommandSpawn { program, source } => {
                format!("unable to run {program}: {source}")
            }
            Self::MissingChecksum { algorithm } => {
                format!("bundle has no {algorithm} checksum recorded")
            }
            Self::DeleteCountMismatch { requested, deleted } => format!(
                "LTA DB gave us {requested} records to process, but we only deleted {deleted} records"
            ),
        }
    }
}

/// Reasons a tape step refused to advance a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A tape command exited non-zero.
    CommandFailed {
        /// Command label such as `hsi put`.
        command: &'static str,
        /// Exit code, absent when the process was killed by a signal.
        returncode: Option<i32>,
    },
    /// The digest reported by the tape system differs from the one recorded at bundle creation.
    ChecksumMismatch {
        /// Digest recorded on the bundle.
        expected: String,
        /// Digest reported by `hsi hashlist`.
        actual: String,
    },
    /// `hsi hashverify` did not report `(sha512) OK`.
    VerifyFailed {
        /// Raw command output.
        output: String,
    },
    /// Command output did not follow the expected column layout.
    MalformedOutput {
        /// Command label.
        command: &'static str,
        /// Parser complaint.
        problem: String,
        /// Raw command output.
        output: String,
    },
}

impl Display for Rejection {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::CommandFailed {
                command,
                returncode: Some(code),
            } => write!(formatter, "{command} Command Failed (returncode: {code})"),
            Self::CommandFailed {
                command,
                returncode: None,
            } => write!(formatter, "{command} Command Failed (terminated by signal)"),
            Self::ChecksumMismatch { expected, actual } => write!(
                formatter,
                "Checksum mismatch between creation and destination: expected {expected}, found {actual}"
            ),
            Self::VerifyFailed { output } => write!(
                formatter,
                "hashverify unable to verify checksum in HPSS: {}",
                output.trim_end()
            ),
            Self::MalformedOutput {
                command,
                problem,
                output,
            } => write!(
                formatter,
                "{command} returned unparsable output ({problem}): {:?}",
                output.trim_end()
            ),
        }
    }
}
