//! Sample bundles and tape-system output.

use lta_core::{Bundle, BundleStatus, Checksum, MetadataRecord};
use uuid::Uuid;

/// SHA-512 digest used by [`bundle`].
pub const SAMPLE_DIGEST: &str = "f438c7e451f5027ce93fab1b394be7582c9f0af2fe4be8b494b1b60610f2fe44a4f831b237be6f2e12c7997bf26b9a94832ea3cc8679b8fd77d361ae65a4ed9b";
/// Tape root used by the fixture configuration.
pub const TAPE_BASE: &str = "/home/projects/icecube";
/// Staging directory used by the fixture configuration.
pub const STAGING_BASE: &str = "/global/cscratch1/sd/icecube/lta";

/// A bundle as the coordinator would hand it to a worker in `status`.
#[must_use]
pub fn bundle(status: BundleStatus) -> Bundle {
    let uuid = Uuid::new_v4();
    let mut bundle = Bundle::new(
        uuid,
        "/data/exp/IceCube/2019/filtered/PFFilt/1109",
        format!("/mnt/lfss/jade-lta/bundler_out/{uuid}.zip"),
    );
    bundle.source = "WIPAC".to_string();
    bundle.dest = "NERSC".to_string();
    bundle.size = 536_870_912;
    bundle.checksum = Checksum::sha512(SAMPLE_DIGEST);
    bundle.status = Some(status);
    bundle
}

/// Tape path the workers derive for `bundle` under [`TAPE_BASE`].
#[must_use]
pub fn hpss_path(bundle: &Bundle) -> String {
    format!("{TAPE_BASE}{}/{}.zip", bundle.path, bundle.uuid)
}

/// `count` metadata records belonging to `bundle_uuid`.
#[must_use]
pub fn metadata(bundle_uuid: Uuid, count: usize) -> Vec<MetadataRecord> {
    (0..count)
        .map(|_| MetadataRecord {
            uuid: Uuid::new_v4(),
            bundle_uuid,
            file_catalog_uuid: Uuid::new_v4(),
        })
        .collect()
}

/// `hsi -P hashlist` output reporting `digest` for `path`.
#[must_use]
pub fn hashlist_output(digest: &str, path: &str) -> String {
    format!("{digest} sha512 {path} [hsi]\n")
}

/// `hsi -P hashverify -A` output for `path` with the given result column.
#[must_use]
pub fn hashverify_output(path: &str, result: &str) -> String {
    format!("{path}: (sha512) {result}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hpss_path_joins_tape_base_path_and_archive_name() {
        let bundle = bundle(BundleStatus::Taping);
        assert_eq!(
            hpss_path(&bundle),
            format!(
                "/home/projects/icecube/data/exp/IceCube/2019/filtered/PFFilt/1109/{}.zip",
                bundle.uuid
            )
        );
    }
}
