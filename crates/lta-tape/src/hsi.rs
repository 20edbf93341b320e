//! Exact argv for the HPSS command-line tools.
//!
//! `-P` puts `hsi` in popen mode: all listable output goes to stdout, quietly,
//! without interactive transfer messages.

use lta_core::TapeCommand;

/// Default location of the HPSS availability probe.
pub const DEFAULT_HPSS_AVAIL_PATH: &str = "/usr/common/software/bin/hpss_avail";
/// Default location of the `hsi` client.
pub const DEFAULT_HSI_PATH: &str = "/usr/bin/hsi";

/// Builds tape commands against configured binary locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HsiToolkit {
    hsi: String,
    hpss_avail: String,
}

impl Default for HsiToolkit {
    fn default() -> Self {
        Self::new(DEFAULT_HSI_PATH, DEFAULT_HPSS_AVAIL_PATH)
    }
}

impl HsiToolkit {
    /// Toolkit using the given `hsi` and `hpss_avail` binaries.
    #[must_use]
    pub fn new(hsi: impl Into<String>, hpss_avail: impl Into<String>) -> Self {
        Self {
            hsi: hsi.into(),
            hpss_avail: hpss_avail.into(),
        }
    }

    /// `hpss_avail archive`
    #[must_use]
    pub fn availability_probe(&self) -> TapeCommand {
        TapeCommand::new("hpss_avail", self.hpss_avail.clone(), ["archive"])
    }

    /// `hsi mkdir -p <dir>`
    #[must_use]
    pub fn mkdir(&self, dir: &str) -> TapeCommand {
        TapeCommand::new("hsi mkdir", self.hsi.clone(), ["mkdir", "-p", dir])
    }

    /// `hsi put -c on -H sha512 <src> : <dest>`
    ///
    /// `-c on` keeps the checksum; `-H sha512` has HPSS compute and validate
    /// the digest during the transfer.
    #[must_use]
    pub fn put(&self, src: &str, dest: &str) -> TapeCommand {
        TapeCommand::new(
            "hsi put",
            self.hsi.clone(),
            ["put", "-c", "on", "-H", "sha512", src, ":", dest],
        )
    }

    /// `hsi -P hashlist <path>`
    #[must_use]
    pub fn hashlist(&self, path: &str) -> TapeCommand {
        TapeCommand::new("hsi hashlist", self.hsi.clone(), ["-P", "hashlist", path])
    }

    /// `hsi -P hashverify -A <path>`; `-A` enables auto-scheduling of retrievals.
    #[must_use]
    pub fn hashverify(&self, path: &str) -> TapeCommand {
        TapeCommand::new(
            "hsi hashverify",
            self.hsi.clone(),
            ["-P", "hashverify", "-A", path],
        )
    }
}
