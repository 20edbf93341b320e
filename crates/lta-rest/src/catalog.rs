//! File Catalog client.

use async_trait::async_trait;
use lta_core::{Catalog, CatalogEntry, FileRecord, Location, LtaResult};
use reqwest::Method;
use serde::Serialize;
use uuid::Uuid;

use crate::client::{RestClient, RestSettings};

#[derive(Serialize)]
struct LocationsRequest<'a> {
    locations: &'a [Location],
}

/// [`Catalog`] backed by the File Catalog REST service.
#[derive(Clone)]
pub struct FileCatalogClient {
    rest: RestClient,
}

impl FileCatalogClient {
    /// Connect to the File Catalog described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: RestSettings) -> LtaResult<Self> {
        Ok(Self {
            rest: RestClient::new("file_catalog", settings)?,
        })
    }
}

#[async_trait]
impl Catalog for FileCatalogClient {
    async fn create_file(&self, record: &FileRecord) -> LtaResult<()> {
        self.rest
            .send("file.create", Method::POST, "api/files", record)
            .await
    }

    async fn update_file(&self, uuid: Uuid, record: &FileRecord) -> LtaResult<()> {
        self.rest
            .send(
                "file.update",
                Method::PATCH,
                &format!("api/files/{uuid}"),
                record,
            )
            .await
    }

    async fn get_file(&self, uuid: Uuid) -> LtaResult<CatalogEntry> {
        self.rest
            .get_json("file.get", &format!("api/files/{uuid}"), &[])
            .await
    }

    async fn add_locations(&self, uuid: Uuid, locations: &[Location]) -> LtaResult<()> {
        self.rest
            .send(
                "file.add_locations",
                Method::POST,
                &format!("api/files/{uuid}/locations"),
                &LocationsRequest { locations },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use httpmock::prelude::*;
    use lta_core::{Checksum, LtaArchiveInfo, LtaError};
    use serde_json::json;

    fn client(server: &MockServer) -> anyhow::Result<FileCatalogClient> {
        Ok(FileCatalogClient::new(RestSettings {
            base_url: server.base_url().parse()?,
            token: "fc-token".to_string(),
            timeout: Duration::from_secs(5),
            retries: 0,
        })?)
    }

    fn record(uuid: Uuid) -> FileRecord {
        FileRecord {
            uuid,
            logical_name: "/home/projects/icecube/data/exp/X.zip".into(),
            checksum: Checksum::sha512("abc"),
            locations: vec![Location::hpss(
                "NERSC",
                "/home/projects/icecube/data/exp/X.zip",
            )],
            file_size: 1234,
            lta: LtaArchiveInfo {
                date_archived: "2019-01-01T00:00:00.000000".into(),
            },
        }
    }

    #[tokio::test]
    async fn create_posts_full_record() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let uuid = Uuid::new_v4();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/files")
                .header("authorization", "Bearer fc-token")
                .json_body(json!({
                    "uuid": uuid,
                    "logical_name": "/home/projects/icecube/data/exp/X.zip",
                    "checksum": {"sha512": "abc"},
                    "locations": [{
                        "site": "NERSC",
                        "path": "/home/projects/icecube/data/exp/X.zip",
                        "hpss": true,
                        "online": false
                    }],
                    "file_size": 1234,
                    "lta": {"date_archived": "2019-01-01T00:00:00.000000"}
                }));
            then.status(201).json_body(json!({"_links": {}, "file": "/api/files/x"}));
        });

        client(&server)?.create_file(&record(uuid)).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn create_conflict_surfaces_status() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/files");
            then.status(409).body("conflict with existing file (uuid already exists)");
        });

        let err = client(&server)?
            .create_file(&record(Uuid::new_v4()))
            .await
            .err();
        assert!(matches!(err, Some(LtaError::HttpStatus { status: 409, .. })));
        Ok(())
    }

    #[tokio::test]
    async fn update_patches_by_uuid() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let uuid = Uuid::new_v4();
        let mock = server.mock(|when, then| {
            when.method(PATCH).path(format!("/api/files/{uuid}"));
            then.status(200).json_body(json!({}));
        });

        client(&server)?.update_file(uuid, &record(uuid)).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn get_reads_logical_name() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let uuid = Uuid::new_v4();
        server.mock(|when, then| {
            when.method(GET).path(format!("/api/files/{uuid}"));
            then.status(200).json_body(json!({
                "uuid": uuid,
                "logical_name": "/data/exp/IceCube/2019/file.i3.zst",
                "meta_modify_date": "2019-01-01 00:00:00"
            }));
        });

        let entry = client(&server)?.get_file(uuid).await?;
        assert_eq!(entry.logical_name, "/data/exp/IceCube/2019/file.i3.zst");
        assert!(entry.locations.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn add_locations_wraps_list() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let uuid = Uuid::new_v4();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(format!("/api/files/{uuid}/locations"))
                .json_body(json!({
                    "locations": [{
                        "site": "NERSC",
                        "path": "/tape/X.zip:/data/exp/file.i3",
                        "archive": true
                    }]
                }));
            then.status(200).json_body(json!({}));
        });

        let location = Location::in_archive("NERSC", "/tape/X.zip", "/data/exp/file.i3");
        client(&server)?.add_locations(uuid, &[location]).await?;
        mock.assert();
        Ok(())
    }
}
