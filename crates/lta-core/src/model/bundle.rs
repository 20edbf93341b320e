//! Bundle lifecycle types owned by the coordinator.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{LtaError, LtaResult};

/// Digest algorithm recorded for every archive.
pub const SHA512: &str = "sha512";

/// Lifecycle status of a bundle.
///
/// Pipeline stages are declared in order; `Quarantined` sits outside the
/// ordering and is terminal for the workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleStatus {
    /// Requested but not yet built.
    Specified,
    /// Archive built at the source site.
    Created,
    /// Staged for transfer.
    Staged,
    /// Moving between sites.
    Transferring,
    /// Ready to be written to tape.
    Taping,
    /// Written to tape, awaiting checksum verification.
    Verifying,
    /// Verified and recorded in the catalog.
    Completed,
    /// Detached from the staging disk.
    Detached,
    /// Source copy removed.
    SourceDeleted,
    /// Staging copies removed.
    Deleted,
    /// Nothing left to do.
    Finished,
    /// Parked for operator intervention.
    Quarantined,
}

impl BundleStatus {
    const PIPELINE: [Self; 11] = [
        Self::Specified,
        Self::Created,
        Self::Staged,
        Self::Transferring,
        Self::Taping,
        Self::Verifying,
        Self::Completed,
        Self::Detached,
        Self::SourceDeleted,
        Self::Deleted,
        Self::Finished,
    ];

    /// Wire label used by the coordinator.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Specified => "specified",
            Self::Created => "created",
            Self::Staged => "staged",
            Self::Transferring => "transferring",
            Self::Taping => "taping",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Detached => "detached",
            Self::SourceDeleted => "source-deleted",
            Self::Deleted => "deleted",
            Self::Finished => "finished",
            Self::Quarantined => "quarantined",
        }
    }

    fn stage_index(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|stage| *stage == self)
    }

    /// Whether moving from `self` to `next` is a strictly forward pipeline step.
    ///
    /// Quarantine is a sidestep, not a pipeline stage, so it never counts as forward.
    #[must_use]
    pub fn is_forward(self, next: Self) -> bool {
        match (self.stage_index(), next.stage_index()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl Display for BundleStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for BundleStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::PIPELINE
            .iter()
            .chain(std::iter::once(&Self::Quarantined))
            .find(|status| status.as_str() == value.trim())
            .copied()
            .ok_or_else(|| value.to_string())
    }
}

/// Digests keyed by algorithm name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(pub BTreeMap<String, String>);

impl Checksum {
    /// Build a checksum map holding a single SHA-512 digest.
    #[must_use]
    pub fn sha512(digest: impl Into<String>) -> Self {
        let mut digests = BTreeMap::new();
        digests.insert(SHA512.to_string(), digest.into());
        Self(digests)
    }

    /// Look up the digest recorded for `algorithm`.
    #[must_use]
    pub fn digest(&self, algorithm: &str) -> Option<&str> {
        self.0.get(algorithm).map(String::as_str)
    }
}

/// Unit of archival work as handed out by the coordinator.
///
/// Workers hold a transient, non-authoritative copy for one claim cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Coordinator identifier.
    pub uuid: Uuid,
    /// Site that produced the bundle.
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    /// Site that archives the bundle.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dest: String,
    /// Logical path fragment in the archive namespace.
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    /// Path of the archive file at the source side; its basename names the archive.
    #[serde(default, deserialize_with = "null_as_default")]
    pub bundle_path: String,
    /// Declared archive size in bytes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    /// Digests recorded at bundle creation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub checksum: Checksum,
    /// Lifecycle status at the time of the claim.
    #[serde(default)]
    pub status: Option<BundleStatus>,
    /// Whether a claimant currently holds the bundle.
    #[serde(default, deserialize_with = "null_as_default")]
    pub claimed: bool,
    /// Identity of the claimant holding the bundle.
    #[serde(default)]
    pub claimant: Option<String>,
    /// Diagnostic recorded on quarantine.
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    /// Creation time as recorded by the coordinator.
    #[serde(default)]
    pub create_timestamp: Option<String>,
    /// Last update time as recorded by the coordinator.
    #[serde(default)]
    pub update_timestamp: Option<String>,
    /// Ordering key used when retried work is re-queued.
    #[serde(default)]
    pub work_priority_timestamp: Option<String>,
}

impl Bundle {
    /// Minimal bundle used when only identity and placement matter.
    #[must_use]
    pub fn new(uuid: Uuid, path: impl Into<String>, bundle_path: impl Into<String>) -> Self {
        Self {
            uuid,
            source: String::new(),
            dest: String::new(),
            path: path.into(),
            bundle_path: bundle_path.into(),
            size: 0,
            checksum: Checksum::default(),
            status: None,
            claimed: false,
            claimant: None,
            reason: String::new(),
            create_timestamp: None,
            update_timestamp: None,
            work_priority_timestamp: None,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A bundle handed out by a pop.
///
/// The coordinator records the claim before replying, so a reply whose body
/// does not fit [`Bundle`] still names a bundle this worker now holds.
#[derive(Debug)]
pub enum PoppedBundle {
    /// The reply decoded cleanly.
    Valid(Bundle),
    /// The reply carried a usable `uuid` but the rest did not decode.
    Malformed {
        /// Identifier of the claimed bundle.
        uuid: Uuid,
        /// Why the body could not be decoded.
        error: LtaError,
    },
}

impl PoppedBundle {
    /// Decode a pop reply's `bundle` object received from `service`.
    ///
    /// # Errors
    ///
    /// Returns [`LtaError::Decode`] when the object has no parsable `uuid`;
    /// such a claim cannot be addressed at all.
    pub fn decode(service: &'static str, value: Value) -> LtaResult<Self> {
        let decode_error = |source| LtaError::Decode {
            service,
            operation: "bundle.pop",
            source,
        };
        let uuid: Uuid = serde_json::from_value(value.get("uuid").cloned().unwrap_or_default())
            .map_err(decode_error)?;
        Ok(match serde_json::from_value::<Bundle>(value) {
            Ok(bundle) => Self::Valid(bundle),
            Err(source) => Self::Malformed {
                uuid,
                error: decode_error(source),
            },
        })
    }

    /// Identifier of the claimed bundle.
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        match self {
            Self::Valid(bundle) => bundle.uuid,
            Self::Malformed { uuid, .. } => *uuid,
        }
    }
}

/// Worker identity under which a bundle is exclusively held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimant {
    name: String,
    instance: Uuid,
}

impl Claimant {
    /// Build a claimant from the configured component name and a per-process instance id.
    #[must_use]
    pub fn new(name: impl Into<String>, instance: Uuid) -> Self {
        Self {
            name: name.into(),
            instance,
        }
    }

    /// Build a claimant with a freshly generated instance id.
    #[must_use]
    pub fn generate(name: impl Into<String>) -> Self {
        Self::new(name, Uuid::new_v4())
    }
}

impl Display for Claimant {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}-{}", self.name, self.instance)
    }
}

/// Scope of a pop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopQuery {
    /// Source site label.
    pub source: String,
    /// Destination site label.
    pub dest: String,
    /// Status the claimed bundle must be in.
    pub status: BundleStatus,
}

/// Partial bundle update sent with `PATCH /Bundles/{uuid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundlePatch {
    /// New lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BundleStatus>,
    /// New diagnostic string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// New claim flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed: Option<bool>,
    /// Update stamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_timestamp: Option<String>,
    /// Re-prioritisation stamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_priority_timestamp: Option<String>,
}

impl BundlePatch {
    /// Advance to `status`, clearing the reason and releasing the claim.
    #[must_use]
    pub fn advance(status: BundleStatus, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            reason: Some(String::new()),
            claimed: Some(false),
            update_timestamp: Some(lta_timestamp(now)),
            work_priority_timestamp: None,
        }
    }

    /// Park the bundle in quarantine with `reason`, refreshing its work priority.
    #[must_use]
    pub fn quarantine(reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(BundleStatus::Quarantined),
            reason: Some(reason.into()),
            claimed: None,
            update_timestamp: None,
            work_priority_timestamp: Some(lta_timestamp(now)),
        }
    }
}

/// Render a timestamp the way the coordinator stores them (UTC, microseconds, no offset).
#[must_use]
pub fn lta_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Current time rendered with [`lta_timestamp`].
#[must_use]
pub fn now_timestamp() -> String {
    lta_timestamp(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn status_labels_round_trip_through_serde() -> anyhow::Result<()> {
        let encoded = serde_json::to_value(BundleStatus::SourceDeleted)?;
        assert_eq!(encoded, json!("source-deleted"));
        let decoded: BundleStatus = serde_json::from_value(json!("verifying"))?;
        assert_eq!(decoded, BundleStatus::Verifying);
        assert_eq!("taping".parse::<BundleStatus>(), Ok(BundleStatus::Taping));
        assert_eq!(
            "quarantined".parse::<BundleStatus>(),
            Ok(BundleStatus::Quarantined)
        );
        assert!("archived".parse::<BundleStatus>().is_err());
        Ok(())
    }

    #[test]
    fn forward_transitions_follow_pipeline_order() {
        assert!(BundleStatus::Taping.is_forward(BundleStatus::Verifying));
        assert!(BundleStatus::Verifying.is_forward(BundleStatus::Completed));
        assert!(!BundleStatus::Completed.is_forward(BundleStatus::Verifying));
        assert!(!BundleStatus::Taping.is_forward(BundleStatus::Taping));
        assert!(!BundleStatus::Taping.is_forward(BundleStatus::Quarantined));
        assert!(!BundleStatus::Quarantined.is_forward(BundleStatus::Completed));
    }

    #[test]
    fn bundle_decodes_sparse_coordinator_payload() -> anyhow::Result<()> {
        let bundle: Bundle = serde_json::from_value(json!({
            "uuid": "398ca1ed-0178-4333-a323-8b9158c3dd88",
            "bundle_path": "/path/on/source/rse/398ca1ed-0178-4333-a323-8b9158c3dd88.zip",
            "path": "/data/exp/IceCube/2019/filtered/PFFilt/1109",
            "checksum": {"sha512": "abc", "adler32": "89d5efeb"},
            "status": "taping",
            "claimed": true,
            "unknown_field": 42,
        }))?;
        assert_eq!(bundle.status, Some(BundleStatus::Taping));
        assert_eq!(bundle.checksum.digest(SHA512), Some("abc"));
        assert_eq!(bundle.checksum.digest("adler32"), Some("89d5efeb"));
        assert!(bundle.claimed);
        assert!(bundle.reason.is_empty());
        Ok(())
    }

    #[test]
    fn bundle_tolerates_null_scalars() -> anyhow::Result<()> {
        let bundle: Bundle = serde_json::from_value(json!({
            "uuid": "398ca1ed-0178-4333-a323-8b9158c3dd88",
            "path": "/data/exp/IceCube/2019/filtered/PFFilt/1109",
            "bundle_path": null,
            "size": null,
            "checksum": null,
            "status": "taping",
            "claimed": null,
            "reason": null,
            "claimant": null,
        }))?;
        assert_eq!(bundle.size, 0);
        assert!(bundle.reason.is_empty());
        assert!(bundle.bundle_path.is_empty());
        assert!(!bundle.claimed);
        assert_eq!(bundle.checksum.digest(SHA512), None);
        Ok(())
    }

    #[test]
    fn popped_bundle_keeps_uuid_when_body_is_malformed() -> anyhow::Result<()> {
        let uuid = Uuid::new_v4();
        let popped = PoppedBundle::decode(
            "lta",
            json!({"uuid": uuid, "status": "archived", "size": "big"}),
        )?;
        assert_eq!(popped.uuid(), uuid);
        let PoppedBundle::Malformed { error, .. } = popped else {
            anyhow::bail!("expected a malformed bundle");
        };
        assert!(
            error
                .detail()
                .starts_with("lta bundle.pop response could not be decoded:")
        );

        let popped = PoppedBundle::decode("lta", json!({"uuid": uuid, "reason": null}))?;
        assert!(matches!(popped, PoppedBundle::Valid(ref bundle) if bundle.uuid == uuid));

        assert!(matches!(
            PoppedBundle::decode("lta", json!({"uuid": "not-a-uuid"})),
            Err(LtaError::Decode {
                operation: "bundle.pop",
                ..
            })
        ));
        assert!(PoppedBundle::decode("lta", json!({"path": "/data"})).is_err());
        Ok(())
    }

    #[test]
    fn advance_patch_clears_reason_and_claim() -> anyhow::Result<()> {
        let now = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).single();
        let now = now.ok_or_else(|| anyhow::anyhow!("invalid timestamp"))?;
        let patch = BundlePatch::advance(BundleStatus::Completed, now);
        assert_eq!(
            serde_json::to_value(&patch)?,
            json!({
                "status": "completed",
                "reason": "",
                "claimed": false,
                "update_timestamp": "2020-01-02T03:04:05.000000",
            })
        );
        Ok(())
    }

    #[test]
    fn quarantine_patch_only_touches_status_reason_priority() -> anyhow::Result<()> {
        let now = Utc.with_ymd_and_hms(2021, 6, 7, 8, 9, 10).single();
        let now = now.ok_or_else(|| anyhow::anyhow!("invalid timestamp"))?;
        let patch = BundlePatch::quarantine("BY:me REASON:broken", now);
        assert_eq!(
            serde_json::to_value(&patch)?,
            json!({
                "status": "quarantined",
                "reason": "BY:me REASON:broken",
                "work_priority_timestamp": "2021-06-07T08:09:10.000000",
            })
        );
        Ok(())
    }

    #[test]
    fn claimant_renders_name_and_instance() {
        let instance = Uuid::nil();
        let claimant = Claimant::new("nersc-verifier", instance);
        assert_eq!(
            claimant.to_string(),
            "nersc-verifier-00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(claimant, Claimant::new("nersc-verifier", instance));
        assert_ne!(
            Claimant::generate("nersc-verifier"),
            Claimant::generate("nersc-verifier")
        );
    }
}
