//! Errors raised while reading tape-system output.

use thiserror::Error;

/// Command output did not match the expected column grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// The first line of output held no columns at all.
    #[error("command output was empty")]
    EmptyOutput,
    /// The first line held fewer columns than the grammar requires.
    #[error("command output is missing a column")]
    MissingColumn {
        /// Number of columns the grammar requires.
        required: usize,
        /// Number of columns actually present.
        found: usize,
    },
}

impl OutputError {
    /// Short description used in quarantine reasons.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::EmptyOutput => "no output on the first line".to_string(),
            Self::MissingColumn { required, found } => {
                format!("expected {required} columns but found only {found}")
            }
        }
    }
}
