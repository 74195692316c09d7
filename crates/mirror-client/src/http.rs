//! JSON/HTTP implementation of the store ports.
//!
//! Endpoint layout:
//!
//! - `POST   /api/v1/login`, `POST /api/v1/logout`
//! - `POST   /api/v1/attachments/list`
//! - `POST   /api/v1/attachments/{kind}/{perm_id}/update` (batched ops)
//! - `POST   /api/v1/attachments/{kind}/{perm_id}/versions` (single add)
//! - `DELETE /api/v1/attachments/{kind}/{perm_id}/{file_name}`
//! - `PATCH  /api/v1/attachments/{kind}/{perm_id}/{file_name}`
//! - `GET    /api/v1/datasets/{code}`, `GET /api/v1/datasets/{code}/properties`
//! - `POST   /api/v1/datasets`, `PATCH /api/v1/datasets/{code}`
//! - `PUT    /api/v1/datasets/{code}/files/{path}` (payload upload)
//! - `GET    /api/v1/datasets/{code}/files/{path}` (payload download)

use async_trait::async_trait;
use mirror_data::{
    AttachmentSnapshot, AttachmentVersion, DataSetRecord, EntityRef, FileManifest,
};
use reqwest::{Client, Response, StatusCode};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use url::Url;

use crate::dto::{
    AttachmentListRequest, AttachmentListResponse, AttachmentUpdateRequest, AttachmentVersionDto,
    ChangesResponse, DataSetDto, EntityKeyDto, ErrorResponse, LoginRequest, LoginResponse,
    PatchAttachmentRequest, PropertiesResponse, UpdateDataSetRequest, UpdateOpDto,
    snapshot_from_files,
};
use crate::ports::{
    AttachmentUpdateOp, Auth, FetchOptions, FileTransfer, ReadApi, SessionToken, WriteApi,
};
use crate::{Error, Result};

/// JSON/HTTP client for one store instance.
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
}

impl HttpRemote {
    /// Creates a client for the store at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Maps a non-success response to [`Error::Status`], using the store's
    /// error body when it sends one.
    async fn status_error(endpoint: &str, response: Response) -> Error {
        let status = response.status().as_u16();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error.message,
            Err(_) => "no error detail".to_string(),
        };
        Error::Status {
            status,
            endpoint: endpoint.to_string(),
            message,
        }
    }

    async fn expect_success(endpoint: &str, response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::status_error(endpoint, response).await)
        }
    }
}

#[async_trait]
impl Auth for HttpRemote {
    async fn login(&self, user: &str, password: &str) -> Result<SessionToken> {
        let endpoint = "/api/v1/login";
        let response = self
            .client
            .post(self.url(endpoint)?)
            .json(&LoginRequest { user, password })
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => {
                let body: LoginResponse = response.json().await?;
                tracing::debug!(user, "session opened");
                Ok(SessionToken::new(body.token))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::AuthRejected {
                user: user.to_string(),
            }),
            _ => Err(Self::status_error(endpoint, response).await),
        }
    }

    async fn logout(&self, token: SessionToken) -> Result<()> {
        let endpoint = "/api/v1/logout";
        let response = self
            .client
            .post(self.url(endpoint)?)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        Self::expect_success(endpoint, response).await?;
        tracing::debug!("session surrendered");
        Ok(())
    }
}

#[async_trait]
impl ReadApi for HttpRemote {
    async fn list_changed_entities(
        &self,
        token: &SessionToken,
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<EntityRef>> {
        let endpoint = "/api/v1/changes";
        let mut url = self.url(endpoint)?;
        url.query_pairs_mut()
            .append_pair("since", &since.to_rfc3339());
        let response = self
            .client
            .get(url)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        let response = Self::expect_success(endpoint, response).await?;
        let body: ChangesResponse = response.json().await?;
        Ok(body.entities.into_iter().map(Into::into).collect())
    }

    async fn list_attachments(
        &self,
        token: &SessionToken,
        refs: &[EntityRef],
        options: FetchOptions,
    ) -> Result<HashMap<String, AttachmentSnapshot>> {
        let endpoint = "/api/v1/attachments/list";
        let request = AttachmentListRequest {
            entities: refs
                .iter()
                .map(|r| EntityKeyDto {
                    kind: r.kind,
                    perm_id: r.perm_id.clone(),
                })
                .collect(),
            with_content: options.with_content,
            with_history: options.with_history,
        };
        let response = self
            .client
            .post(self.url(endpoint)?)
            .bearer_auth(token.as_str())
            .json(&request)
            .send()
            .await?;
        let response = Self::expect_success(endpoint, response).await?;
        let body: AttachmentListResponse = response.json().await?;

        let mut snapshots = HashMap::with_capacity(body.entities.len());
        for (perm_id, files) in body.entities {
            snapshots.insert(perm_id, snapshot_from_files(files, endpoint)?);
        }
        Ok(snapshots)
    }

    async fn get_data_set(
        &self,
        token: &SessionToken,
        code: &str,
    ) -> Result<Option<DataSetRecord>> {
        let endpoint = format!("/api/v1/datasets/{code}");
        let response = self
            .client
            .get(self.url(&endpoint)?)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        match response.status() {
            StatusCode::OK => {
                let dto: DataSetDto = response.json().await?;
                Ok(Some(dto.into()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(Self::status_error(&endpoint, response).await),
        }
    }

    async fn list_properties(
        &self,
        token: &SessionToken,
        code: &str,
    ) -> Result<BTreeMap<String, String>> {
        let endpoint = format!("/api/v1/datasets/{code}/properties");
        let response = self
            .client
            .get(self.url(&endpoint)?)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        let response = Self::expect_success(&endpoint, response).await?;
        let body: PropertiesResponse = response.json().await?;
        Ok(body.properties)
    }
}

#[async_trait]
impl WriteApi for HttpRemote {
    async fn apply_attachment_update(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        ops: &[AttachmentUpdateOp],
    ) -> Result<()> {
        let endpoint = format!(
            "/api/v1/attachments/{}/{}/update",
            entity.kind, entity.perm_id
        );
        let request = AttachmentUpdateRequest {
            ops: ops.iter().map(UpdateOpDto::from_op).collect(),
        };
        let response = self
            .client
            .post(self.url(&endpoint)?)
            .bearer_auth(token.as_str())
            .json(&request)
            .send()
            .await?;
        Self::expect_success(&endpoint, response).await?;
        Ok(())
    }

    async fn add_attachment_version(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        version: &AttachmentVersion,
    ) -> Result<()> {
        let endpoint = format!(
            "/api/v1/attachments/{}/{}/versions",
            entity.kind, entity.perm_id
        );
        let response = self
            .client
            .post(self.url(&endpoint)?)
            .bearer_auth(token.as_str())
            .json(&AttachmentVersionDto::from_domain(version))
            .send()
            .await?;
        Self::expect_success(&endpoint, response).await?;
        Ok(())
    }

    async fn delete_attachment(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        file_name: &str,
    ) -> Result<()> {
        let endpoint = format!(
            "/api/v1/attachments/{}/{}/{file_name}",
            entity.kind, entity.perm_id
        );
        let response = self
            .client
            .delete(self.url(&endpoint)?)
            .bearer_auth(token.as_str())
            .send()
            .await?;
        Self::expect_success(&endpoint, response).await?;
        Ok(())
    }

    async fn patch_attachment(
        &self,
        token: &SessionToken,
        entity: &EntityRef,
        file_name: &str,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<()> {
        let endpoint = format!(
            "/api/v1/attachments/{}/{}/{file_name}",
            entity.kind, entity.perm_id
        );
        let response = self
            .client
            .patch(self.url(&endpoint)?)
            .bearer_auth(token.as_str())
            .json(&PatchAttachmentRequest { title, description })
            .send()
            .await?;
        Self::expect_success(&endpoint, response).await?;
        Ok(())
    }

    async fn register_data_set(
        &self,
        token: &SessionToken,
        record: &DataSetRecord,
        staged_dir: &Path,
    ) -> Result<()> {
        let endpoint = "/api/v1/datasets";
        let dto: DataSetDto = record.into();
        let response = self
            .client
            .post(self.url(endpoint)?)
            .bearer_auth(token.as_str())
            .json(&dto)
            .send()
            .await?;
        Self::expect_success(endpoint, response).await?;

        // Upload staged payload files after the metadata is accepted, in
        // manifest order.
        for path in record.manifest.file_paths() {
            let endpoint = format!("/api/v1/datasets/{}/files/{path}", record.code);
            let bytes = tokio::fs::read(staged_dir.join(path)).await?;
            let response = self
                .client
                .put(self.url(&endpoint)?)
                .bearer_auth(token.as_str())
                .body(bytes)
                .send()
                .await?;
            Self::expect_success(&endpoint, response).await?;
        }
        Ok(())
    }

    async fn update_data_set(
        &self,
        token: &SessionToken,
        code: &str,
        properties: &BTreeMap<String, String>,
        parents: Option<&BTreeSet<String>>,
    ) -> Result<()> {
        let endpoint = format!("/api/v1/datasets/{code}");
        let response = self
            .client
            .patch(self.url(&endpoint)?)
            .bearer_auth(token.as_str())
            .json(&UpdateDataSetRequest {
                properties,
                parents,
            })
            .send()
            .await?;
        Self::expect_success(&endpoint, response).await?;
        Ok(())
    }
}

#[async_trait]
impl FileTransfer for HttpRemote {
    async fn download_files(
        &self,
        token: &SessionToken,
        code: &str,
        manifest: &FileManifest,
        dest_dir: &Path,
    ) -> Result<()> {
        for entry in &manifest.entries {
            let target = dest_dir.join(&entry.path);
            if entry.directory {
                tokio::fs::create_dir_all(&target).await?;
                continue;
            }
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let endpoint = format!("/api/v1/datasets/{code}/files/{}", entry.path);
            let response = self
                .client
                .get(self.url(&endpoint)?)
                .bearer_auth(token.as_str())
                .send()
                .await?;
            let response = Self::expect_success(&endpoint, response).await?;
            let bytes = response.bytes().await?;
            tokio::fs::write(&target, &bytes).await?;
        }
        tracing::debug!(code, files = manifest.file_paths().count(), "payload staged");
        Ok(())
    }
}
