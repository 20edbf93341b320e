//! External tape-system invocations and their captured results.

use std::fmt::{self, Display, Formatter};

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeCommand {
    /// Short label used in logs, metrics and quarantine reasons (e.g. `hsi put`).
    pub label: &'static str,
    /// Program to execute.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
}

impl TapeCommand {
    /// Build a command from a label, program and arguments.
    #[must_use]
    pub fn new<I, S>(label: &'static str, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program followed by its arguments.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl Display for TapeCommand {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.argv().join(" "))
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub returncode: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with `code`.
    #[must_use]
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            returncode: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Exit code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.returncode, Some(0))
    }
}
