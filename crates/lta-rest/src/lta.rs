//! LTA DB coordinator client.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lta_core::{
    BundlePatch, Claimant, ComponentStatus, Coordinator, LtaResult, MetadataRecord, PopQuery,
    PoppedBundle,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{RestClient, RestSettings};

#[derive(Serialize)]
struct PopRequest {
    claimant: String,
}

#[derive(Deserialize)]
struct PopResponse {
    #[serde(default)]
    bundle: Option<Value>,
}

#[derive(Deserialize)]
struct MetadataPage {
    #[serde(default)]
    results: Vec<MetadataRecord>,
}

#[derive(Serialize)]
struct BulkDeleteRequest<'a> {
    metadata: &'a [Uuid],
}

#[derive(Deserialize)]
struct BulkDeleteResponse {
    count: usize,
}

/// [`Coordinator`] backed by the LTA DB REST service.
#[derive(Clone)]
pub struct LtaDbClient {
    rest: RestClient,
}

impl LtaDbClient {
    /// Connect to the LTA DB described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: RestSettings) -> LtaResult<Self> {
        Ok(Self {
            rest: RestClient::new("lta", settings)?,
        })
    }
}

#[async_trait]
impl Coordinator for LtaDbClient {
    async fn pop_bundle(
        &self,
        query: &PopQuery,
        claimant: &Claimant,
    ) -> LtaResult<Option<PoppedBundle>> {
        let params = [
            ("source", query.source.clone()),
            ("dest", query.dest.clone()),
            ("status", query.status.to_string()),
        ];
        let body = PopRequest {
            claimant: claimant.to_string(),
        };
        let response: PopResponse = self
            .rest
            .send_json(
                "bundle.pop",
                Method::POST,
                "Bundles/actions/pop",
                &params,
                &body,
            )
            .await?;
        let Some(value) = response.bundle.filter(|value| !value.is_null()) else {
            return Ok(None);
        };
        let popped = PoppedBundle::decode(self.rest.service(), value)?;
        if let PoppedBundle::Malformed { uuid, error } = &popped {
            warn!(bundle = %uuid, detail = %error.detail(), "claimed bundle did not decode");
        }
        Ok(Some(popped))
    }

    async fn patch_bundle(&self, uuid: Uuid, patch: &BundlePatch) -> LtaResult<()> {
        info!(bundle = %uuid, status = ?patch.status, "PATCH /Bundles");
        self.rest
            .send(
                "bundle.patch",
                Method::PATCH,
                &format!("Bundles/{uuid}"),
                patch,
            )
            .await
    }

    async fn list_metadata(
        &self,
        bundle_uuid: Uuid,
        limit: usize,
    ) -> LtaResult<Vec<MetadataRecord>> {
        let params = [
            ("bundle_uuid", bundle_uuid.to_string()),
            ("limit", limit.to_string()),
        ];
        let page: MetadataPage = self
            .rest
            .get_json("metadata.list", "Metadata", &params)
            .await?;
        Ok(page.results)
    }

    async fn bulk_delete_metadata(&self, uuids: &[Uuid]) -> LtaResult<usize> {
        let response: BulkDeleteResponse = self
            .rest
            .send_json(
                "metadata.bulk_delete",
                Method::POST,
                "Metadata/actions/bulk_delete",
                &[],
                &BulkDeleteRequest { metadata: uuids },
            )
            .await?;
        Ok(response.count)
    }

    async fn patch_status(
        &self,
        component_type: &str,
        name: &str,
        status: &ComponentStatus,
    ) -> LtaResult<()> {
        let mut body = BTreeMap::new();
        body.insert(name, status);
        self.rest
            .send(
                "status.patch",
                Method::PATCH,
                &format!("status/{component_type}"),
                &body,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use httpmock::prelude::*;
    use lta_core::{BundleStatus, LtaError};
    use serde_json::json;

    fn client(server: &MockServer) -> anyhow::Result<LtaDbClient> {
        Ok(LtaDbClient::new(RestSettings {
            base_url: server.base_url().parse()?,
            token: "lta-token".to_string(),
            timeout: Duration::from_secs(5),
            retries: 0,
        })?)
    }

    fn query() -> PopQuery {
        PopQuery {
            source: "WIPAC".into(),
            dest: "NERSC".into(),
            status: BundleStatus::Verifying,
        }
    }

    #[tokio::test]
    async fn pop_sends_scope_and_claimant() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let instance = Uuid::new_v4();
        let bundle_uuid = Uuid::new_v4();
        let claimant = Claimant::new("testing-verifier", instance);
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/Bundles/actions/pop")
                .query_param("source", "WIPAC")
                .query_param("dest", "NERSC")
                .query_param("status", "verifying")
                .header("authorization", "Bearer lta-token")
                .json_body(json!({"claimant": format!("testing-verifier-{instance}")}));
            then.status(200).json_body(json!({
                "bundle": {
                    "uuid": bundle_uuid,
                    "path": "/data/exp/IceCube/2019/filtered/PFFilt/1109",
                    "bundle_path": "/mnt/lfss/jade-lta/bundler_out/X.zip",
                    "size": 1234,
                    "checksum": {"sha512": "abc"},
                    "status": "verifying",
                    "claimed": true,
                    "unexpected_field": 7
                }
            }));
        });

        let popped = client(&server)?.pop_bundle(&query(), &claimant).await?;
        let Some(PoppedBundle::Valid(bundle)) = popped else {
            anyhow::bail!("expected a decoded bundle");
        };
        assert_eq!(bundle.uuid, bundle_uuid);
        assert_eq!(bundle.size, 1234);
        assert_eq!(bundle.checksum.digest("sha512"), Some("abc"));
        assert_eq!(bundle.status, Some(BundleStatus::Verifying));
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn pop_with_null_bundle_means_no_work() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/Bundles/actions/pop");
            then.status(200).json_body(json!({"bundle": null}));
        });

        let claimant = Claimant::generate("testing-verifier");
        assert!(client(&server)?.pop_bundle(&query(), &claimant).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn pop_tolerates_nulls_and_keeps_undecodable_claims() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let tolerant = Uuid::new_v4();
        let mut first = server.mock(|when, then| {
            when.method(POST).path("/Bundles/actions/pop");
            then.status(200).json_body(json!({
                "bundle": {
                    "uuid": tolerant,
                    "path": "/data/exp/IceCube/2019/filtered/PFFilt/1109",
                    "status": "taping",
                    "reason": null,
                    "size": null
                }
            }));
        });
        let claimant = Claimant::generate("testing-mover");
        let lta = client(&server)?;
        let popped = lta.pop_bundle(&query(), &claimant).await?;
        assert!(matches!(
            popped,
            Some(PoppedBundle::Valid(ref bundle)) if bundle.uuid == tolerant && bundle.reason.is_empty()
        ));
        first.delete();

        let broken = Uuid::new_v4();
        server.mock(|when, then| {
            when.method(POST).path("/Bundles/actions/pop");
            then.status(200).json_body(json!({
                "bundle": {"uuid": broken, "status": "archived"}
            }));
        });
        let popped = lta.pop_bundle(&query(), &claimant).await?;
        assert!(matches!(
            popped,
            Some(PoppedBundle::Malformed { uuid, .. }) if uuid == broken
        ));
        Ok(())
    }

    #[tokio::test]
    async fn patch_omits_absent_fields() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let uuid = Uuid::new_v4();
        let patch = BundlePatch {
            status: Some(BundleStatus::Quarantined),
            reason: Some("BY:x REASON:y".into()),
            work_priority_timestamp: Some("2019-01-01T00:00:00.000000".into()),
            ..BundlePatch::default()
        };
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path(format!("/Bundles/{uuid}"))
                .json_body(json!({
                    "status": "quarantined",
                    "reason": "BY:x REASON:y",
                    "work_priority_timestamp": "2019-01-01T00:00:00.000000"
                }));
            then.status(200).json_body(json!({}));
        });

        client(&server)?.patch_bundle(uuid, &patch).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn metadata_page_and_bulk_delete() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let bundle_uuid = Uuid::new_v4();
        let record = MetadataRecord {
            uuid: Uuid::new_v4(),
            bundle_uuid,
            file_catalog_uuid: Uuid::new_v4(),
        };
        let list = server.mock(|when, then| {
            when.method(GET)
                .path("/Metadata")
                .query_param("bundle_uuid", bundle_uuid.to_string())
                .query_param("limit", "1000");
            then.status(200).json_body(json!({"results": [record]}));
        });
        let delete = server.mock(|when, then| {
            when.method(POST)
                .path("/Metadata/actions/bulk_delete")
                .json_body(json!({"metadata": [record.uuid]}));
            then.status(200).json_body(json!({"count": 1}));
        });

        let lta = client(&server)?;
        let page = lta.list_metadata(bundle_uuid, 1000).await?;
        assert_eq!(page, vec![record.clone()]);
        assert_eq!(lta.bulk_delete_metadata(&[record.uuid]).await?, 1);
        list.assert();
        delete.assert();
        Ok(())
    }

    #[tokio::test]
    async fn heartbeat_is_keyed_by_component_name() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let status = ComponentStatus {
            timestamp: "2019-01-01T00:00:02.000000".into(),
            last_work_begin_timestamp: "2019-01-01T00:00:00.000000".into(),
            last_work_end_timestamp: "2019-01-01T00:00:01.000000".into(),
            status: json!({"bundles_claimed_total": 0}),
        };
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/status/nersc_verifier")
                .json_body(json!({
                    "testing-verifier": {
                        "timestamp": "2019-01-01T00:00:02.000000",
                        "last_work_begin_timestamp": "2019-01-01T00:00:00.000000",
                        "last_work_end_timestamp": "2019-01-01T00:00:01.000000",
                        "status": {"bundles_claimed_total": 0}
                    }
                }));
            then.status(200).json_body(json!({}));
        });

        client(&server)?
            .patch_status("nersc_verifier", "testing-verifier", &status)
            .await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn pop_transport_failure_propagates() -> anyhow::Result<()> {
        let lta = LtaDbClient::new(RestSettings {
            base_url: "http://127.0.0.1:9/".parse()?,
            token: "lta-token".to_string(),
            timeout: Duration::from_secs(2),
            retries: 0,
        })?;
        let err = lta
            .pop_bundle(&query(), &Claimant::generate("testing-verifier"))
            .await
            .err();
        assert!(matches!(
            err,
            Some(LtaError::Transport { operation: "bundle.pop", .. })
        ));
        Ok(())
    }
}
