//! Column grammar for `hsi -P` output.
//!
//! Only the first line of standard output is read. It is split on whitespace
//! and columns are addressed by fixed index. Short output is an error, never a
//! panic.

use crate::error::OutputError;

/// First line of `hsi -P hashlist <path>`, e.g.
/// `1693e9d0...7873 sha512 /home/projects/icecube/.../50145c5c.zip [hsi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashListEntry<'a> {
    /// Digest reported by HPSS.
    pub digest: &'a str,
    /// Algorithm column, when present.
    pub algorithm: Option<&'a str>,
    /// Path column, when present.
    pub path: Option<&'a str>,
}

/// First line of `hsi -P hashverify -A <path>`, e.g.
/// `/home/projects/icecube/.../50145c5c.zip: (sha512) OK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashVerifyEntry<'a> {
    /// Path column including its trailing colon.
    pub path: &'a str,
    /// Algorithm tag, e.g. `(sha512)`.
    pub algorithm: &'a str,
    /// Verification result, e.g. `OK`.
    pub result: &'a str,
}

impl HashVerifyEntry<'_> {
    /// Whether HPSS confirmed the SHA-512 digest.
    #[must_use]
    pub fn is_sha512_ok(&self) -> bool {
        self.algorithm == "(sha512)" && self.result == "OK"
    }
}

fn first_line_columns(output: &str) -> Vec<&str> {
    output
        .split('\n')
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .collect()
}

fn require_columns(columns: &[&str], required: usize) -> Result<(), OutputError> {
    if columns.is_empty() {
        return Err(OutputError::EmptyOutput);
    }
    if columns.len() < required {
        return Err(OutputError::MissingColumn {
            required,
            found: columns.len(),
        });
    }
    Ok(())
}

/// Parse `hashlist` output.
///
/// # Errors
///
/// Returns [`OutputError::EmptyOutput`] when the first line is blank.
pub fn parse_hashlist(output: &str) -> Result<HashListEntry<'_>, OutputError> {
    let columns = first_line_columns(output);
    require_columns(&columns, 1)?;
    Ok(HashListEntry {
        digest: columns[0],
        algorithm: columns.get(1).copied(),
        path: columns.get(2).copied(),
    })
}

/// Parse `hashverify` output.
///
/// # Errors
///
/// Returns [`OutputError::EmptyOutput`] when the first line is blank and
/// [`OutputError::MissingColumn`] when it has fewer than three columns.
pub fn parse_hashverify(output: &str) -> Result<HashVerifyEntry<'_>, OutputError> {
    let columns = first_line_columns(output);
    require_columns(&columns, 3)?;
    Ok(HashVerifyEntry {
        path: columns[0],
        algorithm: columns[1],
        result: columns[2],
    })
}
